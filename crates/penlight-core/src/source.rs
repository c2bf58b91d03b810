//! Loading a group's members and penlight colors through the batch runner.

use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::batch::{BatchError, BoundedConcurrencyRunner, TaskOutcome, TaskSet};
use crate::member::{Group, Member, PenlightColor};

/// Members and penlights are fetched side by side.
pub const GROUP_FETCH_CONCURRENCY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(1);

const MEMBERS_TASK: &str = "members";
const PENLIGHTS_TASK: &str = "penlights";

/// Where member data comes from.
#[async_trait]
pub trait MemberSource: Send + Sync {
    async fn fetch_members(&self, group: Group) -> anyhow::Result<Vec<Member>>;

    async fn fetch_penlights(&self, group: Group) -> anyhow::Result<Vec<PenlightColor>>;
}

/// A store that returns raw JSON rows per table name.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch_rows(&self, table: &str) -> anyhow::Result<Vec<serde_json::Value>>;
}

/// Adapts a [`RowSource`] to [`MemberSource`] using the per-group table
/// names (`<group>_member_master`, `<group>_penlight`).
#[derive(Debug, Clone)]
pub struct TableSource<S> {
    rows: S,
}

impl<S: RowSource> TableSource<S> {
    pub fn new(rows: S) -> Self {
        Self { rows }
    }

    pub fn into_inner(self) -> S {
        self.rows
    }

    async fn fetch_table<T: DeserializeOwned + Send>(&self, table: &str) -> anyhow::Result<Vec<T>> {
        let rows = self
            .rows
            .fetch_rows(table)
            .await
            .with_context(|| format!("Failed to fetch {table}"))?;
        decode_rows(table, rows)
    }
}

#[async_trait]
impl<S: RowSource> MemberSource for TableSource<S> {
    async fn fetch_members(&self, group: Group) -> anyhow::Result<Vec<Member>> {
        self.fetch_table(&group.member_table()).await
    }

    async fn fetch_penlights(&self, group: Group) -> anyhow::Result<Vec<PenlightColor>> {
        self.fetch_table(&group.penlight_table()).await
    }
}

fn decode_rows<T: DeserializeOwned>(
    table: &str,
    rows: Vec<serde_json::Value>,
) -> anyhow::Result<Vec<T>> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            serde_json::from_value(row).with_context(|| format!("Invalid row {index} in {table}"))
        })
        .collect()
}

/// Everything fetched for one group. Each half succeeds or fails on its own.
#[derive(Debug)]
pub struct GroupData {
    pub group: Group,
    pub members: TaskOutcome<Vec<Member>>,
    pub penlights: TaskOutcome<Vec<PenlightColor>>,
}

impl GroupData {
    pub fn is_complete(&self) -> bool {
        self.members.is_success() && self.penlights.is_success()
    }

    pub fn penlight(&self, id: u32) -> Option<&PenlightColor> {
        self.penlights.value()?.iter().find(|p| p.id == id)
    }
}

/// Fetch members and penlight colors for `group` concurrently.
///
/// Each fetch is its own single-task batch on one shared runner, so both run
/// at once. A failure in one fetch is reported in its outcome and does not
/// affect the other.
pub async fn fetch_group_data(
    source: Arc<dyn MemberSource>,
    group: Group,
) -> Result<GroupData, BatchError> {
    let runner = BoundedConcurrencyRunner::with_limit(GROUP_FETCH_CONCURRENCY);

    let members_source = Arc::clone(&source);
    let member_tasks = TaskSet::new().with(MEMBERS_TASK, move || async move {
        members_source.fetch_members(group).await
    })?;
    let penlight_tasks = TaskSet::new().with(PENLIGHTS_TASK, move || async move {
        source.fetch_penlights(group).await
    })?;

    let (mut member_result, mut penlight_result) = tokio::join!(
        runner.run_all(member_tasks),
        runner.run_all(penlight_tasks)
    );

    let members = member_result
        .take(MEMBERS_TASK)
        .unwrap_or_else(|| TaskOutcome::missing(MEMBERS_TASK));
    let penlights = penlight_result
        .take(PENLIGHTS_TASK)
        .unwrap_or_else(|| TaskOutcome::missing(PENLIGHTS_TASK));

    tracing::info!(
        %group,
        members = members.value().map_or(0, Vec::len),
        penlights = penlights.value().map_or(0, Vec::len),
        complete = members.is_success() && penlights.is_success(),
        "Group data fetched"
    );

    Ok(GroupData {
        group,
        members,
        penlights,
    })
}
