// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Interface of the task layer that consumes compiled programs.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ahs_ir::{Assignments, Error, Result};

use crate::compile::CompiledTask;
use crate::passes::tiling::{ClusterIndex, ParallelDecoder};

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Completed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Occupation of every site before and after the evolution of one shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotResult {
    pub pre_sequence: Vec<u8>,
    pub post_sequence: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub shots: Vec<ShotResult>,
    pub metadata: Assignments,
}

impl TaskResult {
    /// Split every shot of a tiled program into the shots of its clusters.
    pub fn decode(&self, decoder: &ParallelDecoder) -> Result<Vec<IndexMap<ClusterIndex, ShotResult>>> {
        self.shots
            .iter()
            .map(|shot| {
                let pre = decoder.decode(&shot.pre_sequence)?;
                let mut post = decoder.decode(&shot.post_sequence)?;
                Ok(pre
                    .into_iter()
                    .map(|(cluster, pre_sequence)| {
                        let post_sequence = post.shift_remove(&cluster).unwrap_or_default();
                        (
                            cluster,
                            ShotResult {
                                pre_sequence,
                                post_sequence,
                            },
                        )
                    })
                    .collect())
            })
            .collect()
    }
}

/// A place compiled tasks are submitted to.
pub trait TaskBackend {
    fn submit(&mut self, task: &CompiledTask) -> Result<TaskId>;

    fn status(&self, task_id: &TaskId) -> Result<TaskStatus>;

    /// Result of a completed task.
    fn fetch(&self, task_id: &TaskId) -> Result<TaskResult>;

    fn cancel(&mut self, task_id: &TaskId) -> Result<()>;
}

struct LocalTask {
    task: CompiledTask,
    status: TaskStatus,
}

/// In-memory backend without dynamics: every shot measures the initial
/// filling.
#[derive(Default)]
pub struct LocalBackend {
    tasks: IndexMap<TaskId, LocalTask>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run all queued tasks. Returns the number of tasks run.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        for entry in self.tasks.values_mut() {
            if entry.status == TaskStatus::Queued {
                entry.status = TaskStatus::Completed;
                count += 1;
            }
        }
        count
    }

    fn entry(&self, task_id: &TaskId) -> Result<&LocalTask> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown task {task_id}.")))
    }
}

impl TaskBackend for LocalBackend {
    fn submit(&mut self, task: &CompiledTask) -> Result<TaskId> {
        let task_id = Uuid::new_v4();
        self.tasks.insert(
            task_id,
            LocalTask {
                task: task.clone(),
                status: TaskStatus::Queued,
            },
        );
        Ok(task_id)
    }

    fn status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        Ok(self.entry(task_id)?.status)
    }

    fn fetch(&self, task_id: &TaskId) -> Result<TaskResult> {
        let entry = self.entry(task_id)?;
        if entry.status != TaskStatus::Completed {
            return Err(Error::InvalidInput(format!(
                "Task {task_id} is {}, results are not available.",
                entry.status
            )));
        }
        let filling = entry.task.spec.filling().to_vec();
        let shot = ShotResult {
            pre_sequence: filling.clone(),
            post_sequence: filling,
        };
        Ok(TaskResult {
            task_id: *task_id,
            shots: vec![shot; entry.task.spec.shots()],
            metadata: entry.task.metadata.clone(),
        })
    }

    fn cancel(&mut self, task_id: &TaskId) -> Result<()> {
        let status = self.entry(task_id)?.status;
        if status != TaskStatus::Queued {
            return Err(Error::InvalidInput(format!(
                "Task {task_id} is {status} and cannot be cancelled."
            )));
        }
        if let Some(entry) = self.tasks.get_mut(task_id) {
            entry.status = TaskStatus::Cancelled;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileOptions, compile};
    use ahs_builder::{Builder, ProgramStart};
    use ahs_ir::BravaisLattice;

    fn tasks(parallel: bool) -> Vec<CompiledTask> {
        let builder = BravaisLattice::chain(2, 6, false)
            .unwrap()
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(Builder::uniform)
            .and_then(|b| b.constant(1, 1))
            .unwrap();
        let builder = if parallel {
            builder.parallelize(20).unwrap()
        } else {
            builder
        };
        let routine = builder.parse().unwrap();
        compile(&routine, &CompileOptions::new(3).unwrap()).unwrap()
    }

    #[test]
    fn test_task_lifecycle() {
        let mut backend = LocalBackend::new();
        let task = &tasks(false)[0];
        let first = backend.submit(task).unwrap();
        let second = backend.submit(task).unwrap();
        assert_eq!(backend.status(&first).unwrap(), TaskStatus::Queued);
        assert!(backend.fetch(&first).is_err());

        backend.cancel(&second).unwrap();
        assert_eq!(backend.run_pending(), 1);
        assert_eq!(backend.status(&first).unwrap(), TaskStatus::Completed);
        assert_eq!(backend.status(&second).unwrap(), TaskStatus::Cancelled);
        assert!(backend.cancel(&first).is_err());
        assert!(backend.status(&Uuid::new_v4()).is_err());

        let result = backend.fetch(&first).unwrap();
        assert_eq!(result.shots.len(), 3);
        assert_eq!(result.shots[0].post_sequence, vec![1, 1]);
    }

    #[test]
    fn test_results_are_decoded_per_cluster() {
        let task = &tasks(true)[0];
        let mut backend = LocalBackend::new();
        let id = backend.submit(task).unwrap();
        backend.run_pending();
        let result = backend.fetch(&id).unwrap();
        let decoded = result.decode(&task.decoder).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].len(), task.decoder.n_clusters());
        assert!(decoded[0].values().all(|shot| shot.pre_sequence == vec![1, 1]));
    }
}
