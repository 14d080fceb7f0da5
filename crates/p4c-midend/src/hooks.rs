//! Instrumentation hooks called around every pass.
//!
//! A hook sees the tree through a shared reference and cannot change it.
//! Hooks are shared (`Rc`) between the pipelines of one run, so the ones
//! that record something use interior mutability.

use std::cell::{Cell, RefCell};
use std::io::Write;

use p4c_ir::print::print_program;
use p4c_ir::Program;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassPoint {
    Before,
    After,
}

pub trait DebugHook {
    fn on_pass(&self, pipeline: &str, pass: &str, point: PassPoint, program: &Program);
}

/// One recorded tree dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassDump {
    /// Position in the run, counting every recorded dump.
    pub sequence: usize,
    pub pipeline: String,
    pub pass: String,
    pub point: PassPoint,
    pub program: String,
}

/// Collects a printed dump of the tree after every pass.
#[derive(Debug, Default)]
pub struct DumpHook {
    dumps: RefCell<Vec<PassDump>>,
    /// Also record the tree before each pass.
    before: bool,
}

impl DumpHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_before(mut self) -> Self {
        self.before = true;
        self
    }

    pub fn dumps(&self) -> Vec<PassDump> {
        self.dumps.borrow().clone()
    }

    /// The dump recorded after `pass` last ran.
    pub fn last_after(&self, pass: &str) -> Option<PassDump> {
        self.dumps
            .borrow()
            .iter()
            .rev()
            .find(|d| d.pass == pass && d.point == PassPoint::After)
            .cloned()
    }

    pub fn take(&self) -> Vec<PassDump> {
        std::mem::take(&mut *self.dumps.borrow_mut())
    }
}

impl DebugHook for DumpHook {
    fn on_pass(&self, pipeline: &str, pass: &str, point: PassPoint, program: &Program) {
        if point == PassPoint::Before && !self.before {
            return;
        }
        let mut dumps = self.dumps.borrow_mut();
        let sequence = dumps.len();
        dumps.push(PassDump {
            sequence,
            pipeline: pipeline.to_string(),
            pass: pass.to_string(),
            point,
            program: print_program(program),
        });
    }
}

/// Streams [`PassDump`] records as JSON lines, one after every pass.
pub struct JsonLinesHook<W: Write> {
    out: RefCell<W>,
    sequence: Cell<usize>,
}

impl<W: Write> JsonLinesHook<W> {
    pub fn new(out: W) -> Self {
        JsonLinesHook {
            out: RefCell::new(out),
            sequence: Cell::new(0),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> DebugHook for JsonLinesHook<W> {
    fn on_pass(&self, pipeline: &str, pass: &str, point: PassPoint, program: &Program) {
        if point == PassPoint::Before {
            return;
        }
        let dump = PassDump {
            sequence: self.sequence.get(),
            pipeline: pipeline.to_string(),
            pass: pass.to_string(),
            point,
            program: print_program(program),
        };
        self.sequence.set(dump.sequence + 1);

        let mut out = self.out.borrow_mut();
        let written = serde_json::to_writer(&mut *out, &dump)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(out));
        if let Err(err) = written {
            tracing::warn!(pass, %err, "could not write pass dump");
        }
    }
}

/// Logs the printed tree after every pass at `debug` level.
#[derive(Debug, Default)]
pub struct TracingHook;

impl DebugHook for TracingHook {
    fn on_pass(&self, pipeline: &str, pass: &str, point: PassPoint, program: &Program) {
        if point == PassPoint::After {
            tracing::debug!(pipeline, pass, program = %print_program(program), "after pass");
        }
    }
}
