//! SQLite persistence for videos, transcripts, segments and documents.

use crate::chunking::Chunk;
use crate::error::{MinneError, Result};
use crate::lifecycle::{validate_transition, VideoStatus};
use crate::model::{GeneratedDocument, NewVideo, Segment, Transcript, Video};
use crate::transcription::NormalizedSegment;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// SQLite-backed store for the archive's relational data.
///
/// Chunk embeddings are not persisted here; the search index owns them.
pub struct VideoStore {
    conn: Mutex<Connection>,
}

impl VideoStore {
    /// Open or create the store at the given path.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// A poisoned lock means a panic happened mid-operation; surface it as
    /// an error so callers can still park videos in `error` status.
    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| MinneError::Store(format!("Connection lock poisoned: {}", e)))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS videos (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                file_path TEXT NOT NULL,
                processed_path TEXT,
                thumbnail_path TEXT,
                duration INTEGER,
                recording_date TEXT,
                participants TEXT NOT NULL DEFAULT '[]',
                context_notes TEXT,
                status TEXT NOT NULL,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS transcripts (
                id TEXT PRIMARY KEY,
                video_id TEXT NOT NULL REFERENCES videos(id),
                full_text TEXT NOT NULL,
                language TEXT NOT NULL,
                word_count INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS segments (
                id TEXT PRIMARY KEY,
                transcript_id TEXT NOT NULL REFERENCES transcripts(id),
                video_id TEXT NOT NULL REFERENCES videos(id),
                start_time REAL NOT NULL,
                end_time REAL NOT NULL,
                text TEXT NOT NULL,
                speaker TEXT,
                chunking_method TEXT NOT NULL,
                embedding_indexed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS generated_documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                source_video_ids TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_segments_video ON segments(video_id);
            CREATE INDEX IF NOT EXISTS idx_transcripts_video ON transcripts(video_id);",
        )?;
        Ok(())
    }

    /// Register a new video in `uploaded` status.
    pub fn create_video(&self, new: NewVideo) -> Result<Video> {
        let now = Utc::now();
        let video = Video {
            id: Uuid::new_v4(),
            title: new.title,
            file_path: new.file_path,
            processed_path: None,
            thumbnail_path: None,
            duration: None,
            recording_date: new.recording_date,
            participants: new.participants,
            context_notes: new.context_notes,
            status: VideoStatus::Uploaded,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO videos (id, title, file_path, processed_path, thumbnail_path,
                duration, recording_date, participants, context_notes, status,
                error_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                video.id.to_string(),
                video.title,
                video.file_path,
                video.processed_path,
                video.thumbnail_path,
                video.duration,
                video.recording_date.map(|d| d.to_string()),
                serde_json::to_string(&video.participants)?,
                video.context_notes,
                video.status.to_string(),
                video.error_message,
                video.created_at.to_rfc3339(),
                video.updated_at.to_rfc3339(),
            ],
        )?;
        info!("Registered video {} ({})", video.id, video.title);
        Ok(video)
    }

    pub fn get_video(&self, id: Uuid) -> Result<Video> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT * FROM videos WHERE id = ?1",
            params![id.to_string()],
            video_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                MinneError::NotFound(format!("Video {}", id))
            }
            other => other.into(),
        })
    }

    /// All videos, newest first.
    pub fn list_videos(&self) -> Result<Vec<Video>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM videos ORDER BY created_at DESC")?;
        let videos = stmt
            .query_map([], video_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(videos)
    }

    /// Transition a video's status, validating against the state machine.
    ///
    /// The update is conditional on the status still being the one read,
    /// so a concurrent transition makes this fail instead of silently
    /// overwriting. `error_message` is only written when provided.
    pub fn transition_status(
        &self,
        id: Uuid,
        target: VideoStatus,
        error_message: Option<&str>,
    ) -> Result<Video> {
        let current = self.get_video(id)?.status;
        validate_transition(current, target)?;

        let changed = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE videos
                 SET status = ?1,
                     error_message = COALESCE(?2, error_message),
                     updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![
                    target.to_string(),
                    error_message,
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                    current.to_string(),
                ],
            )?
        };

        if changed == 0 {
            // Lost a race: someone else moved the video first.
            let actual = self.get_video(id)?.status;
            return Err(MinneError::InvalidTransition {
                from: actual,
                to: target,
            });
        }

        debug!("Video {} status: {} -> {}", id, current, target);
        self.get_video(id)
    }

    /// Point a video at its ingested file location.
    pub fn set_file_path(&self, id: Uuid, file_path: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE videos SET file_path = ?1, updated_at = ?2 WHERE id = ?3",
            params![file_path, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(MinneError::NotFound(format!("Video {}", id)));
        }
        Ok(())
    }

    /// Record the artifacts produced by the process stage.
    pub fn set_media_outputs(
        &self,
        id: Uuid,
        processed_path: &str,
        thumbnail_path: &str,
        duration: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE videos
             SET processed_path = ?1, thumbnail_path = ?2, duration = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                processed_path,
                thumbnail_path,
                duration,
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(MinneError::NotFound(format!("Video {}", id)));
        }
        Ok(())
    }

    /// Create a transcript and its utterance-level segments in one
    /// transaction.
    pub fn insert_transcript(
        &self,
        video_id: Uuid,
        language: &str,
        segments: &[NormalizedSegment],
    ) -> Result<Transcript> {
        let now = Utc::now();
        let transcript = Transcript {
            id: Uuid::new_v4(),
            video_id,
            full_text: segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            language: language.to_string(),
            word_count: crate::transcription::word_count(segments),
            created_at: now,
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO transcripts (id, video_id, full_text, language, word_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                transcript.id.to_string(),
                video_id.to_string(),
                transcript.full_text,
                transcript.language,
                transcript.word_count,
                now.to_rfc3339(),
            ],
        )?;
        for seg in segments {
            tx.execute(
                "INSERT INTO segments (id, transcript_id, video_id, start_time, end_time,
                    text, speaker, chunking_method, embedding_indexed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'embedding', 0, ?8)",
                params![
                    Uuid::new_v4().to_string(),
                    transcript.id.to_string(),
                    video_id.to_string(),
                    seg.start,
                    seg.end,
                    seg.text,
                    seg.speaker,
                    now.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;

        info!(
            "Created transcript {} with {} segments for video {}",
            transcript.id,
            segments.len(),
            video_id
        );
        Ok(transcript)
    }

    pub fn transcript_for_video(&self, video_id: Uuid) -> Result<Transcript> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, video_id, full_text, language, word_count, created_at
             FROM transcripts WHERE video_id = ?1",
            params![video_id.to_string()],
            transcript_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                MinneError::NotFound(format!("Transcript for video {}", video_id))
            }
            other => other.into(),
        })
    }

    /// Transcripts for multiple videos, in the order given.
    pub fn transcripts_for_videos(&self, video_ids: &[Uuid]) -> Result<Vec<Transcript>> {
        let mut transcripts = Vec::new();
        for id in video_ids {
            transcripts.push(self.transcript_for_video(*id)?);
        }
        Ok(transcripts)
    }

    /// Segments for a video ordered by start time.
    pub fn segments_for_video(&self, video_id: Uuid) -> Result<Vec<Segment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, transcript_id, video_id, start_time, end_time, text, speaker,
                chunking_method, embedding_indexed, created_at
             FROM segments WHERE video_id = ?1 ORDER BY start_time",
        )?;
        let segments = stmt
            .query_map(params![video_id.to_string()], segment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(segments)
    }

    /// Atomically replace a video's utterance segments with semantic
    /// chunks. The chunks inherit the existing transcript's id; the
    /// original rows are gone only once the insert succeeds.
    pub fn replace_segments(&self, video_id: Uuid, chunks: &[Chunk]) -> Result<usize> {
        let transcript = self.transcript_for_video(video_id)?;
        let now = Utc::now();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM segments WHERE video_id = ?1",
            params![video_id.to_string()],
        )?;
        for chunk in chunks {
            tx.execute(
                "INSERT INTO segments (id, transcript_id, video_id, start_time, end_time,
                    text, speaker, chunking_method, embedding_indexed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'embedding', 0, ?8)",
                params![
                    Uuid::new_v4().to_string(),
                    transcript.id.to_string(),
                    video_id.to_string(),
                    chunk.start_time,
                    chunk.end_time,
                    chunk.text,
                    chunk.speaker,
                    now.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;

        info!(
            "Replaced segments for video {} with {} chunks",
            video_id,
            chunks.len()
        );
        Ok(chunks.len())
    }

    pub fn mark_segments_indexed(&self, video_id: Uuid) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE segments SET embedding_indexed = 1 WHERE video_id = ?1",
            params![video_id.to_string()],
        )?;
        Ok(changed)
    }

    pub fn insert_document(&self, doc: &GeneratedDocument) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO generated_documents (id, title, content, source_video_ids, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                doc.id.to_string(),
                doc.title,
                doc.content,
                serde_json::to_string(&doc.source_video_ids)?,
                doc.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, id: Uuid) -> Result<GeneratedDocument> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, title, content, source_video_ids, created_at
             FROM generated_documents WHERE id = ?1",
            params![id.to_string()],
            document_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                MinneError::NotFound(format!("Document {}", id))
            }
            other => other.into(),
        })
    }

    pub fn list_documents(&self) -> Result<Vec<GeneratedDocument>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, content, source_video_ids, created_at
             FROM generated_documents ORDER BY created_at DESC",
        )?;
        let docs = stmt
            .query_map([], document_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(docs)
    }
}

fn parse_uuid(s: String) -> rusqlite::Result<Uuid> {
    Uuid::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_datetime(s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn video_from_row(row: &Row) -> rusqlite::Result<Video> {
    let participants: String = row.get("participants")?;
    let status: String = row.get("status")?;
    let recording_date: Option<String> = row.get("recording_date")?;

    Ok(Video {
        id: parse_uuid(row.get("id")?)?,
        title: row.get("title")?,
        file_path: row.get("file_path")?,
        processed_path: row.get("processed_path")?,
        thumbnail_path: row.get("thumbnail_path")?,
        duration: row.get("duration")?,
        recording_date: recording_date.and_then(|d| NaiveDate::from_str(&d).ok()),
        participants: serde_json::from_str(&participants).unwrap_or_default(),
        context_notes: row.get("context_notes")?,
        status: VideoStatus::from_str(&status).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        error_message: row.get("error_message")?,
        created_at: parse_datetime(row.get("created_at")?)?,
        updated_at: parse_datetime(row.get("updated_at")?)?,
    })
}

fn transcript_from_row(row: &Row) -> rusqlite::Result<Transcript> {
    Ok(Transcript {
        id: parse_uuid(row.get(0)?)?,
        video_id: parse_uuid(row.get(1)?)?,
        full_text: row.get(2)?,
        language: row.get(3)?,
        word_count: row.get(4)?,
        created_at: parse_datetime(row.get(5)?)?,
    })
}

fn segment_from_row(row: &Row) -> rusqlite::Result<Segment> {
    Ok(Segment {
        id: parse_uuid(row.get(0)?)?,
        transcript_id: parse_uuid(row.get(1)?)?,
        video_id: parse_uuid(row.get(2)?)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        text: row.get(5)?,
        speaker: row.get(6)?,
        chunking_method: row.get(7)?,
        embedding_indexed: row.get(8)?,
        created_at: parse_datetime(row.get(9)?)?,
    })
}

fn document_from_row(row: &Row) -> rusqlite::Result<GeneratedDocument> {
    let source_video_ids: String = row.get(3)?;
    Ok(GeneratedDocument {
        id: parse_uuid(row.get(0)?)?,
        title: row.get(1)?,
        content: row.get(2)?,
        source_video_ids: serde_json::from_str(&source_video_ids).unwrap_or_default(),
        created_at: parse_datetime(row.get(4)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_video(store: &VideoStore, title: &str) -> Video {
        store
            .create_video(NewVideo {
                title: title.to_string(),
                file_path: format!("/videos/{}.mkv", title),
                recording_date: NaiveDate::from_ymd_opt(2025, 3, 14),
                participants: vec!["Ana".to_string(), "Bo".to_string()],
                context_notes: Some("weekly sync".to_string()),
            })
            .unwrap()
    }

    fn segments() -> Vec<NormalizedSegment> {
        vec![
            NormalizedSegment {
                start: 0.0,
                end: 4.0,
                text: "hello everyone".to_string(),
                speaker: "SPEAKER_01".to_string(),
            },
            NormalizedSegment {
                start: 4.0,
                end: 9.0,
                text: "let us get started".to_string(),
                speaker: "SPEAKER_01".to_string(),
            },
        ]
    }

    #[test]
    fn test_create_and_fetch_video_round_trip() {
        let store = VideoStore::in_memory().unwrap();
        let created = new_video(&store, "Standup");

        let fetched = store.get_video(created.id).unwrap();
        assert_eq!(fetched.title, "Standup");
        assert_eq!(fetched.status, VideoStatus::Uploaded);
        assert_eq!(fetched.participants, vec!["Ana", "Bo"]);
        assert_eq!(fetched.recording_date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert!(fetched.processed_path.is_none());
    }

    #[test]
    fn test_get_missing_video_is_not_found() {
        let store = VideoStore::in_memory().unwrap();
        let err = store.get_video(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, MinneError::NotFound(_)));
    }

    #[test]
    fn test_transition_follows_state_machine() {
        let store = VideoStore::in_memory().unwrap();
        let video = new_video(&store, "Standup");

        let video = store
            .transition_status(video.id, VideoStatus::Processing, None)
            .unwrap();
        assert_eq!(video.status, VideoStatus::Processing);

        let err = store
            .transition_status(video.id, VideoStatus::Ready, None)
            .unwrap_err();
        assert!(matches!(
            err,
            MinneError::InvalidTransition {
                from: VideoStatus::Processing,
                to: VideoStatus::Ready,
            }
        ));
        // The failed transition changed nothing.
        assert_eq!(
            store.get_video(video.id).unwrap().status,
            VideoStatus::Processing
        );
    }

    #[test]
    fn test_error_transition_records_message() {
        let store = VideoStore::in_memory().unwrap();
        let video = new_video(&store, "Standup");
        store
            .transition_status(video.id, VideoStatus::Processing, None)
            .unwrap();

        let video = store
            .transition_status(video.id, VideoStatus::Error, Some("ffmpeg exploded"))
            .unwrap();
        assert_eq!(video.status, VideoStatus::Error);
        assert_eq!(video.error_message.as_deref(), Some("ffmpeg exploded"));

        // Terminal: no way out of error.
        assert!(store
            .transition_status(video.id, VideoStatus::Uploaded, None)
            .is_err());
    }

    #[test]
    fn test_transcript_and_segments_round_trip() {
        let store = VideoStore::in_memory().unwrap();
        let video = new_video(&store, "Standup");

        let transcript = store.insert_transcript(video.id, "en", &segments()).unwrap();
        assert_eq!(transcript.full_text, "hello everyone let us get started");
        assert_eq!(transcript.word_count, 6);

        let stored = store.segments_for_video(video.id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].text, "hello everyone");
        assert!(!stored[0].embedding_indexed);
        assert_eq!(stored[0].transcript_id, transcript.id);
    }

    #[test]
    fn test_replace_segments_swaps_in_chunks() {
        let store = VideoStore::in_memory().unwrap();
        let video = new_video(&store, "Standup");
        let transcript = store.insert_transcript(video.id, "en", &segments()).unwrap();

        let chunks = vec![Chunk {
            text: "hello everyone let us get started".to_string(),
            start_time: 0.0,
            end_time: 9.0,
            speaker: "SPEAKER_01".to_string(),
            embedding: vec![0.1, 0.2],
        }];
        store.replace_segments(video.id, &chunks).unwrap();

        let stored = store.segments_for_video(video.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "hello everyone let us get started");
        assert_eq!(stored[0].transcript_id, transcript.id);
        assert_eq!(stored[0].chunking_method, "embedding");
    }

    #[test]
    fn test_mark_segments_indexed() {
        let store = VideoStore::in_memory().unwrap();
        let video = new_video(&store, "Standup");
        store.insert_transcript(video.id, "en", &segments()).unwrap();

        let marked = store.mark_segments_indexed(video.id).unwrap();
        assert_eq!(marked, 2);
        assert!(store
            .segments_for_video(video.id)
            .unwrap()
            .iter()
            .all(|s| s.embedding_indexed));
    }

    #[test]
    fn test_documents_round_trip() {
        let store = VideoStore::in_memory().unwrap();
        let video = new_video(&store, "Standup");

        let doc = GeneratedDocument {
            id: Uuid::new_v4(),
            title: "Decisions".to_string(),
            content: "# Decisions\n\nShip it.".to_string(),
            source_video_ids: vec![video.id],
            created_at: Utc::now(),
        };
        store.insert_document(&doc).unwrap();

        let docs = store.list_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "Decisions");
        assert_eq!(docs[0].source_video_ids, vec![video.id]);

        let fetched = store.get_document(doc.id).unwrap();
        assert_eq!(fetched.content, doc.content);
        assert!(matches!(
            store.get_document(Uuid::new_v4()),
            Err(MinneError::NotFound(_))
        ));
    }

    #[test]
    fn test_poisoned_lock_is_an_error_not_a_panic() {
        let store = std::sync::Arc::new(VideoStore::in_memory().unwrap());
        new_video(&store, "Standup");

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.conn.lock().unwrap();
            panic!("holding the connection lock");
        })
        .join();

        assert!(matches!(store.list_videos(), Err(MinneError::Store(_))));
    }
}
