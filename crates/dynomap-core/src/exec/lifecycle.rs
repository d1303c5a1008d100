//! Creating, deleting and waiting on tables.

use std::time::Duration;

use dynomap_model::input::{CreateTableInput, DeleteTableInput, DescribeTableInput};
use dynomap_model::{DynamoDBError, DynamoDBErrorCode, DynamoDBOperation};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{MapperError, MapperResult};
use crate::exec::{ExecOptions, Executor, list_all_tables};

/// Issue `CreateTable` for each input. Tables that already exist are
/// skipped. Returns the names actually created.
pub async fn create_tables(
    executor: &Executor,
    inputs: Vec<CreateTableInput>,
) -> MapperResult<Vec<String>> {
    let options = ExecOptions::rethrow([DynamoDBErrorCode::ResourceInUseException]);
    let mut created = Vec::with_capacity(inputs.len());
    for input in inputs {
        let table = input.table_name.clone();
        info!(table = %table, "creating table");
        let result = executor
            .exec_with(DynamoDBOperation::CreateTable, &table, &options, |transport| {
                let input = input.clone();
                async move { transport.create_table(input).await }
            })
            .await;
        match result {
            Ok(_) => created.push(table),
            Err(e) if e.store_code() == Some(DynamoDBErrorCode::ResourceInUseException) => {
                debug!(table = %table, "table already exists");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

/// Issue `DeleteTable` for each name. Missing tables are skipped. Returns
/// the names actually deleted.
pub async fn delete_tables(executor: &Executor, names: &[String]) -> MapperResult<Vec<String>> {
    let options = ExecOptions::rethrow([DynamoDBErrorCode::ResourceNotFoundException]);
    let mut deleted = Vec::with_capacity(names.len());
    for name in names {
        info!(table = %name, "deleting table");
        let result = executor
            .exec_with(DynamoDBOperation::DeleteTable, name, &options, |transport| {
                let input = DeleteTableInput {
                    table_name: name.clone(),
                };
                async move { transport.delete_table(input).await }
            })
            .await;
        match result {
            Ok(_) => deleted.push(name.clone()),
            Err(e) if e.is_not_found() => debug!(table = %name, "table already gone"),
            Err(e) => return Err(e),
        }
    }
    Ok(deleted)
}

/// Poll `DescribeTable` until every table and its global indexes are
/// `ACTIVE`. A table that is not found yet counts as pending.
pub async fn wait_for_tables_ready(
    executor: &Executor,
    names: &[String],
    poll: Duration,
    timeout: Option<Duration>,
) -> MapperResult<()> {
    let options = ExecOptions::rethrow([DynamoDBErrorCode::ResourceNotFoundException]);
    let started = Instant::now();
    let mut pending: Vec<String> = names.to_vec();
    loop {
        let mut still_pending = Vec::new();
        for name in pending {
            let result = executor
                .exec_with(DynamoDBOperation::DescribeTable, &name, &options, |transport| {
                    let input = DescribeTableInput {
                        table_name: name.clone(),
                    };
                    async move { transport.describe_table(input).await }
                })
                .await;
            match result {
                Ok(out) if out.table.as_ref().is_some_and(|t| t.is_active()) => {}
                Ok(_) => still_pending.push(name),
                Err(e) if e.is_not_found() => still_pending.push(name),
                Err(e) => return Err(e),
            }
        }
        if still_pending.is_empty() {
            return Ok(());
        }
        check_deadline(started, timeout, &still_pending, "active")?;
        debug!(pending = ?still_pending, "waiting for tables to become active");
        executor.sleep(poll).await?;
        pending = still_pending;
    }
}

/// Poll `ListTables` until none of the names is listed.
pub async fn wait_for_tables_deleted(
    executor: &Executor,
    names: &[String],
    poll: Duration,
    timeout: Option<Duration>,
) -> MapperResult<()> {
    let started = Instant::now();
    loop {
        let existing = list_all_tables(executor).await?;
        let still_pending: Vec<String> = names
            .iter()
            .filter(|n| existing.contains(*n))
            .cloned()
            .collect();
        if still_pending.is_empty() {
            return Ok(());
        }
        check_deadline(started, timeout, &still_pending, "deleted")?;
        debug!(pending = ?still_pending, "waiting for tables to be deleted");
        executor.sleep(poll).await?;
    }
}

fn check_deadline(
    started: Instant,
    timeout: Option<Duration>,
    pending: &[String],
    state: &str,
) -> MapperResult<()> {
    let elapsed = started.elapsed();
    match timeout {
        Some(limit) if elapsed >= limit => Err(MapperError::Timeout {
            elapsed,
            source: DynamoDBError::with_message(
                DynamoDBErrorCode::ResourceInUseException,
                format!("tables not {state}: {}", pending.join(", ")),
            ),
        }),
        _ => Ok(()),
    }
}
