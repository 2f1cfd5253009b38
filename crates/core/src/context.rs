//! Execution context: immutable-per-branch stack of (branchId, env) frames.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type BranchId = String;

#[derive(Clone)]
struct Frame {
    branch_id: BranchId,
    env: Arc<RwLock<HashMap<String, String>>>,
}

/// A cheap-to-clone value type threaded through every node call. Cloning
/// copies the frame stack (a `Vec` of `Arc`s) but shares the underlying env
/// maps, so `Push` never mutates the caller's context while `SetEnv` still
/// mutates the top frame in place for everyone holding a clone of it.
#[derive(Clone)]
pub struct ExecutionContext {
    frames: Vec<Frame>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    /// Single frame with empty id and empty env.
    pub fn empty() -> Self {
        Self {
            frames: vec![Frame {
                branch_id: String::new(),
                env: Arc::new(RwLock::new(HashMap::new())),
            }],
            cancel: CancellationToken::new(),
        }
    }

    /// Root of a top-level execution: single frame with a fresh id and the
    /// caller-supplied initial environment.
    pub fn new(env: HashMap<String, String>) -> Self {
        Self {
            frames: vec![Frame {
                branch_id: Uuid::new_v4().to_string(),
                env: Arc::new(RwLock::new(env)),
            }],
            cancel: CancellationToken::new(),
        }
    }

    /// Appends a frame with a fresh id and a shallow copy of the current
    /// frame's env. Never mutates `self`.
    pub fn push(&self) -> Self {
        let parent_env = self
            .frames
            .last()
            .expect("execution context stack is never empty")
            .env
            .read()
            .expect("env lock poisoned")
            .clone();

        let mut frames = self.frames.clone();
        frames.push(Frame {
            branch_id: Uuid::new_v4().to_string(),
            env: Arc::new(RwLock::new(parent_env)),
        });

        Self {
            frames,
            cancel: self.cancel.clone(),
        }
    }

    pub fn current_branch(&self) -> &str {
        &self
            .frames
            .last()
            .expect("execution context stack is never empty")
            .branch_id
    }

    /// Snapshot of the stack from top (current) to bottom (root). Used by
    /// `OutputValueById`'s ancestor walk.
    pub fn ancestors_to_root(&self) -> Vec<BranchId> {
        self.frames.iter().rev().map(|f| f.branch_id.clone()).collect()
    }

    pub fn env(&self) -> HashMap<String, String> {
        self.frames
            .last()
            .expect("execution context stack is never empty")
            .env
            .read()
            .expect("env lock poisoned")
            .clone()
    }

    /// Mutates only the top frame, in place, shared by every clone of this
    /// exact context that hasn't since been popped off via `push`.
    pub fn set_env(&self, env: HashMap<String, String>) {
        let frame = self
            .frames
            .last()
            .expect("execution context stack is never empty");
        *frame.env.write().expect("env lock poisoned") = env;
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
