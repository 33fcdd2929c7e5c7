use std::collections::{hash_map::Entry, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use futures::{stream, StreamExt};
use tracing::{error, info, instrument, warn};

use shared::{Event, GitlabClient, Member, Project};

/// Trailing monitoring window, date-only precision.
const ACTIVITY_WINDOW_DAYS: i64 = 7;

/// How many projects are fetched at once. `buffered` yields results in
/// input order, so the report keeps the configured project order.
const PROJECT_FETCH_CONCURRENCY: usize = 4;

/// Latest qualifying event (or none) for one member of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub member: Member,
    pub project: Project,
    pub latest_event: Option<Event>,
}

pub fn cutoff_date(now: DateTime<Utc>) -> NaiveDate {
    (now - chrono::Duration::days(ACTIVITY_WINDOW_DAYS)).date_naive()
}

/// One record per (project, member) pair, projects in configured order,
/// members in API-returned order. A project whose member list cannot be
/// fetched or comes back empty contributes no rows; the run continues with
/// the remaining projects.
pub async fn collect_activity(
    client: &GitlabClient,
    projects: &[Project],
    cutoff: NaiveDate,
) -> Vec<ActivityRecord> {
    stream::iter(
        projects
            .iter()
            .map(|project| project_activity(client, project, cutoff)),
    )
    .buffered(PROJECT_FETCH_CONCURRENCY)
    .collect::<Vec<_>>()
    .await
    .into_iter()
    .flatten()
    .collect()
}

#[instrument(skip(client, project), fields(project_id = project.id))]
async fn project_activity(
    client: &GitlabClient,
    project: &Project,
    cutoff: NaiveDate,
) -> Vec<ActivityRecord> {
    info!("Processing project {}", project.name);

    let (members, events) = tokio::join!(
        client.project_members(project.id),
        client.project_events_after(project.id, cutoff)
    );

    let members = match members {
        Ok(members) => members,
        Err(e) => {
            error!("Failed to fetch members for {}: {e:#}", project.name);
            return Vec::new();
        }
    };
    if members.is_empty() {
        warn!("No members found for {}", project.name);
        return Vec::new();
    }

    // A failed event fetch degrades to "no activity" for the whole project
    // rather than aborting the run.
    let events = match events {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to fetch events for {}: {e:#}", project.name);
            Vec::new()
        }
    };
    info!(
        "Found {} members and {} events for {}",
        members.len(),
        events.len(),
        project.name
    );

    records_for_project(project, members, events)
}

/// Joins a project's member list with its event feed.
fn records_for_project(
    project: &Project,
    members: Vec<Member>,
    events: Vec<Event>,
) -> Vec<ActivityRecord> {
    let mut latest = latest_by_author(events);
    members
        .into_iter()
        .map(|member| ActivityRecord {
            latest_event: latest.remove(&member.id),
            project: project.clone(),
            member,
        })
        .collect()
}

/// Reduces the event feed to each author's most recent event in one pass.
/// A held event is replaced only by a strictly newer one, so the first
/// event encountered wins a timestamp tie.
fn latest_by_author(events: Vec<Event>) -> HashMap<u64, Event> {
    let mut latest: HashMap<u64, Event> = HashMap::new();
    for event in events {
        match latest.entry(event.author_id) {
            Entry::Occupied(mut held) => {
                if event.created_at > held.get().created_at {
                    held.insert(event);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(event);
            }
        }
    }
    latest
}
