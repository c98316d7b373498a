//! Batch processing with account-based partitioning
//!
//! This module provides the `BatchProcessor`, which processes a batch of
//! commands concurrently while producing exactly the effects of processing
//! them one by one in file order.
//!
//! # Design
//!
//! Two commands can only influence each other if they share an account name.
//! The processor splits a batch into groups of commands whose names are
//! connected (directly or through other commands), runs the groups
//! concurrently, and runs the commands inside each group in file order.
//!
//! `register` commands are barriers: every command before one finishes before
//! it runs, and every command after it starts afterwards. Account ids are
//! therefore assigned in file order, as in sequential processing.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── Arc<LedgerEngine>   (shared command engine)
//!           └── AsyncLedger   (ledger operations on the blocking pool)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::engine::{CommandOutcome, LedgerEngine};
use crate::types::{LedgerCommand, LedgerError};
use tokio::task::JoinHandle;
use tracing::error;

/// Result of processing a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// Position of the command in its batch
    pub index: usize,

    /// The command that was processed
    pub command: LedgerCommand,

    /// The result of processing (success or error)
    pub result: Result<CommandOutcome, LedgerError>,
}

/// Command with its position in the batch
type Indexed = (usize, LedgerCommand);

/// Batch processor with account-based partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    /// Shared command engine
    engine: Arc<LedgerEngine>,
}

impl BatchProcessor {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `engine` - Arc-wrapped LedgerEngine shared by all groups
    pub fn new(engine: Arc<LedgerEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<LedgerEngine> {
        &self.engine
    }

    /// Partition commands into groups of connected account names
    ///
    /// # Arguments
    ///
    /// * `commands` - Commands with their batch positions
    ///
    /// # Returns
    ///
    /// Groups ordered by their first command. Commands keep their relative
    /// order inside a group, and no two groups share an account name.
    pub fn partition_by_accounts(&self, commands: Vec<Indexed>) -> Vec<Vec<Indexed>> {
        let mut parent: Vec<usize> = (0..commands.len()).collect();
        {
            let mut owner: HashMap<&str, usize> = HashMap::new();
            for (position, (_, command)) in commands.iter().enumerate() {
                for name in command.account_names() {
                    match owner.get(name) {
                        Some(&first) => union(&mut parent, position, first),
                        None => {
                            owner.insert(name, position);
                        }
                    }
                }
            }
        }

        let roots: Vec<usize> = (0..commands.len())
            .map(|position| find(&mut parent, position))
            .collect();

        let mut groups: Vec<Vec<Indexed>> = Vec::new();
        let mut slots: HashMap<usize, usize> = HashMap::new();
        for (command, root) in commands.into_iter().zip(roots) {
            let slot = *slots.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(command);
        }

        groups
    }

    /// Process one group of commands sequentially, in order
    pub async fn process_group(&self, commands: Vec<Indexed>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(commands.len());

        for (index, command) in commands {
            let result = self.engine.process_async(command.clone()).await;
            results.push(ProcessingResult {
                index,
                command,
                result,
            });
        }

        results
    }

    /// Process a batch of commands
    ///
    /// This method:
    /// 1. Splits the batch at `register` commands
    /// 2. Partitions each run between them into connected groups
    /// 3. Spawns a tokio task per group and waits for all of them
    /// 4. Runs the `register` command, then moves on to the next run
    ///
    /// # Returns
    ///
    /// One `ProcessingResult` per command, in batch order
    pub async fn process_batch(&self, batch: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(batch.len());
        let mut run: Vec<Indexed> = Vec::new();

        for (index, command) in batch.into_iter().enumerate() {
            if matches!(command, LedgerCommand::Register { .. }) {
                results.extend(self.process_run(std::mem::take(&mut run)).await);
                results.extend(self.process_group(vec![(index, command)]).await);
            } else {
                run.push((index, command));
            }
        }
        results.extend(self.process_run(run).await);

        results.sort_by_key(|result| result.index);
        results
    }

    async fn process_run(&self, run: Vec<Indexed>) -> Vec<ProcessingResult> {
        if run.is_empty() {
            return Vec::new();
        }

        let mut tasks = Vec::new();
        for group in self.partition_by_accounts(run) {
            let processor = self.clone();
            let commands = group.clone();
            tasks.push((
                commands,
                tokio::spawn(async move { processor.process_group(group).await }),
            ));
        }

        join_groups(tasks).await
    }
}

/// Collect the results of every group task
///
/// A group whose task failed reports every one of its commands as rejected.
/// Its commands may have been partly applied before the failure.
async fn join_groups(
    tasks: Vec<(Vec<Indexed>, JoinHandle<Vec<ProcessingResult>>)>,
) -> Vec<ProcessingResult> {
    let mut results = Vec::new();
    for (commands, task) in tasks {
        match task.await {
            Ok(group_results) => results.extend(group_results),
            Err(e) => {
                error!(error = %e, commands = commands.len(), "command group task failed");
                let failure = LedgerError::storage(format!("command group task failed: {}", e));
                results.extend(commands.into_iter().map(|(index, command)| ProcessingResult {
                    index,
                    command,
                    result: Err(failure.clone()),
                }));
            }
        }
    }
    results
}

fn find(parent: &mut [usize], mut node: usize) -> usize {
    while parent[node] != node {
        parent[node] = parent[parent[node]];
        node = parent[node];
    }
    node
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (a, b) = (find(parent, a), find(parent, b));
    if a != b {
        parent[a.max(b)] = a.min(b);
    }
}
