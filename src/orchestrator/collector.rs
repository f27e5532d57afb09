//! Per-stage accumulation of streamed output.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use thiserror::Error;

use crate::constants::DEFAULT_FINAL_MIN_LEN;
use crate::models::{StageRole, StageStat, StageStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectorError {
    #[error("collector is sealed; no further output is accepted")]
    Sealed,

    #[error("stage '{0}' has already finished its turn")]
    TurnClosed(String),

    #[error("stage '{0}' has no open buffer")]
    UnknownStage(String),
}

/// Output collected for one stage.
#[derive(Debug, Clone)]
pub struct StageBuffer {
    stage_id: String,
    role: StageRole,
    chunks: Vec<String>,
    len: usize,
    leading: Option<char>,
    first_ts: Option<DateTime<Utc>>,
    last_ts: Option<DateTime<Utc>>,
    status: StageStatus,
    turn_open: bool,
}

impl StageBuffer {
    fn new(stage_id: &str, role: StageRole) -> Self {
        Self {
            stage_id: stage_id.to_string(),
            role,
            chunks: Vec::new(),
            len: 0,
            leading: None,
            first_ts: None,
            last_ts: None,
            status: StageStatus::InProgress,
            turn_open: true,
        }
    }

    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    pub fn role(&self) -> StageRole {
        self.role
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Characters collected so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn text(&self) -> String {
        self.chunks.concat()
    }

    pub fn first_ts(&self) -> Option<DateTime<Utc>> {
        self.first_ts
    }

    pub fn last_ts(&self) -> Option<DateTime<Utc>> {
        self.last_ts
    }

    /// `last - first`, never negative.
    pub fn processing_time_ms(&self) -> i64 {
        match (self.first_ts, self.last_ts) {
            (Some(first), Some(last)) => (last - first).num_milliseconds().max(0),
            _ => 0,
        }
    }

    pub fn stat(&self) -> StageStat {
        StageStat {
            status: self.status,
            chunks: self.chunks.len(),
            processing_time_ms: self.processing_time_ms(),
        }
    }

    fn push(&mut self, chunk: String, ts: DateTime<Utc>) {
        if self.leading.is_none() {
            self.leading = chunk.chars().find(|c| !c.is_whitespace());
        }
        self.len += chunk.chars().count();
        self.first_ts.get_or_insert(ts);
        self.last_ts = Some(ts);
        self.chunks.push(chunk);
    }

    fn looks_final(&self, min_len: usize) -> bool {
        let structured = matches!(self.leading, Some('{' | '['));
        if structured && self.len > min_len {
            return true;
        }
        matches!(self.role, StageRole::Aggregator | StageRole::Dispatcher) && self.leading.is_some()
    }

    fn transition(&mut self, to: StageStatus) {
        if self.status == StageStatus::InProgress && to != StageStatus::InProgress {
            tracing::debug!(stage = %self.stage_id, status = %to, "stage buffer status changed");
            self.status = to;
        }
    }
}

/// Collects streamed chunks into one buffer per stage, in arrival order.
#[derive(Debug)]
pub struct StreamCollector {
    buffers: IndexMap<String, StageBuffer>,
    final_min_len: usize,
    sealed: bool,
}

impl Default for StreamCollector {
    fn default() -> Self {
        Self::new(DEFAULT_FINAL_MIN_LEN)
    }
}

impl StreamCollector {
    pub fn new(final_min_len: usize) -> Self {
        Self {
            buffers: IndexMap::new(),
            final_min_len,
            sealed: false,
        }
    }

    /// Register a stage turn before any output arrives.
    pub fn open_turn(&mut self, stage: &str, role: StageRole) -> Result<(), CollectorError> {
        if self.sealed {
            return Err(CollectorError::Sealed);
        }
        if self.buffers.contains_key(stage) {
            return Err(CollectorError::TurnClosed(stage.to_string()));
        }
        self.buffers
            .insert(stage.to_string(), StageBuffer::new(stage, role));
        Ok(())
    }

    /// Append a chunk and re-evaluate the final-output heuristic.
    pub fn append(
        &mut self,
        stage: &str,
        role: StageRole,
        chunk: &str,
        ts: DateTime<Utc>,
    ) -> Result<StageStatus, CollectorError> {
        if self.sealed {
            return Err(CollectorError::Sealed);
        }
        let min_len = self.final_min_len;
        let buffer = self
            .buffers
            .entry(stage.to_string())
            .or_insert_with(|| StageBuffer::new(stage, role));
        if !buffer.turn_open {
            return Err(CollectorError::TurnClosed(stage.to_string()));
        }
        buffer.push(normalize_chunk(chunk).into_owned(), ts);
        if buffer.looks_final(min_len) {
            buffer.transition(StageStatus::Final);
        }
        Ok(buffer.status)
    }

    /// Close a stage's turn. An explicit end-of-turn from the provider marks
    /// the buffer final; a stream that simply stopped leaves it completed.
    pub fn finish_turn(
        &mut self,
        stage: &str,
        explicit_end: bool,
    ) -> Result<StageStatus, CollectorError> {
        if self.sealed {
            return Err(CollectorError::Sealed);
        }
        let buffer = self
            .buffers
            .get_mut(stage)
            .ok_or_else(|| CollectorError::UnknownStage(stage.to_string()))?;
        if !buffer.turn_open {
            return Err(CollectorError::TurnClosed(stage.to_string()));
        }
        buffer.turn_open = false;
        buffer.transition(if explicit_end {
            StageStatus::Final
        } else {
            StageStatus::Completed
        });
        Ok(buffer.status)
    }

    pub fn is_final(&self, stage: &str) -> bool {
        self.status(stage) == Some(StageStatus::Final)
    }

    pub fn status(&self, stage: &str) -> Option<StageStatus> {
        self.buffers.get(stage).map(|b| b.status)
    }

    pub fn buffer(&self, stage: &str) -> Option<&StageBuffer> {
        self.buffers.get(stage)
    }

    pub fn buffers(&self) -> impl Iterator<Item = &StageBuffer> {
        self.buffers.values()
    }

    /// Stage id → text for everything collected so far, without sealing.
    pub fn snapshot(&self) -> IndexMap<String, String> {
        self.buffers
            .iter()
            .map(|(id, b)| (id.clone(), b.text()))
            .collect()
    }

    pub fn stats(&self) -> IndexMap<String, StageStat> {
        self.buffers
            .iter()
            .map(|(id, b)| (id.clone(), b.stat()))
            .collect()
    }

    /// Stop accepting output and hand out the collected text.
    pub fn seal(&mut self) -> IndexMap<String, String> {
        self.sealed = true;
        self.snapshot()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}

/// Re-emit a chunk that is a complete JSON document pretty-printed.
///
/// Some providers double-escape JSON (`{\"file\": ...}`); those chunks are
/// unescaped first. Anything else is kept verbatim.
pub fn normalize_chunk(chunk: &str) -> Cow<'_, str> {
    let trimmed = chunk.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return Cow::Borrowed(chunk);
    }
    if let Some(pretty) = pretty_json(trimmed) {
        return Cow::Owned(pretty);
    }
    if trimmed.contains('\\') {
        let unescaped = trimmed
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\t", "\t");
        if let Some(pretty) = pretty_json(&unescaped) {
            return Cow::Owned(pretty);
        }
    }
    Cow::Borrowed(chunk)
}

fn pretty_json(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    serde_json::to_string_pretty(&value).ok()
}
