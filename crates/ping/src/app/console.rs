use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use ping_core::prelude::*;
use serde::Serialize;

/// One json object per line on the host's output.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum ConsoleLine<'a> {
    Spawn {
        request: &'a SpawnRequest,
    },
    Tune {
        id: MarkerId,
        tuning: &'a VisualTuning,
    },
    Despawn {
        id: MarkerId,
        owner: &'a str,
        label: &'a str,
    },
    Handled {
        line: usize,
        #[serde(flatten)]
        handled: &'a Handled,
    },
    Rejected {
        line: usize,
        reason: String,
    },
}

/// A [`WorldSurface`] that doesn't have a world. It writes what it would have done as json lines.
pub struct ConsoleWorld<W> {
    out: Arc<Mutex<W>>,
}

impl<W: Write + Send> ConsoleWorld<W> {
    pub fn new(out: Arc<Mutex<W>>) -> Self {
        Self { out }
    }

    pub(crate) fn emit(&self, line: &ConsoleLine) -> Result<(), WorldError> {
        let mut json =
            serde_json::to_string(line).map_err(|e| WorldError::Host(e.to_string()))?;
        json.push('\n');
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        out.write_all(json.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| WorldError::Host(e.to_string()))
    }
}

impl<W: Write + Send> WorldSurface for ConsoleWorld<W> {
    fn spawn(&self, request: &SpawnRequest) -> Result<(), WorldError> {
        self.emit(&ConsoleLine::Spawn { request })
    }

    fn tune_visual(&self, id: MarkerId, tuning: &VisualTuning) -> Result<(), WorldError> {
        self.emit(&ConsoleLine::Tune { id, tuning })
    }

    fn despawn(&self, marker: &Marker) -> Result<(), WorldError> {
        self.emit(&ConsoleLine::Despawn {
            id: marker.id,
            owner: &marker.key.owner,
            label: &marker.key.label,
        })
    }
}
