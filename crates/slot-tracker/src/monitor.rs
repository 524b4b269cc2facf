//! Per-target checks: fetch, compare against the last snapshot, notify.

use chrono::{Datelike, NaiveDate, Weekday};
use futures::future::join_all;
use serde_json::json;
use shared_types::{
    AvailableSlot, DeptCatalog, DeptSchedule, DoctorDay, DoctorSchedule, MonitorTarget,
};
use std::sync::Arc;

use crate::client::UpstreamClient;
use crate::detector::{any_first_visit, department_changed, doctor_changed, group_by_date};
use crate::directory::NameDirectory;
use crate::error::TrackerResult;
use crate::notifier::Notifier;
use crate::reporter::ErrorReporter;
use crate::store::{QueryKind, SnapshotStore};

const CATALOG_ENDPOINT: &str = "YuYue/OrderDeptResources";
const DEPARTMENT_ENDPOINT: &str = "YuYue/OrderDocResources";
const DOCTOR_ENDPOINT: &str = "YuYue/OrderDocNoSources";

pub const DEPARTMENT_TITLE: &str = "发现可预约的医生";

/// What a single check ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Upstream gave nothing usable this cycle
    Skipped,
    /// The doctor has no bookable day
    NoBookableDays,
    Unchanged,
    Changed { notified: bool },
}

pub struct Monitor {
    client: Arc<UpstreamClient>,
    store: SnapshotStore,
    notifier: Arc<Notifier>,
    reporter: Arc<ErrorReporter>,
    names: NameDirectory,
    notify_haji_only: bool,
}

impl Monitor {
    pub fn new(
        client: Arc<UpstreamClient>,
        store: SnapshotStore,
        notifier: Arc<Notifier>,
        reporter: Arc<ErrorReporter>,
        notify_haji_only: bool,
    ) -> Self {
        Self {
            client,
            store,
            notifier,
            reporter,
            names: NameDirectory::with_builtin(),
            notify_haji_only,
        }
    }

    pub fn names(&self) -> &NameDirectory {
        &self.names
    }

    /// Check `target` once. Never fails: errors go to the reporter.
    pub async fn run(&self, target: &MonitorTarget) -> Option<CheckOutcome> {
        let (result, context) = match target {
            MonitorTarget::Department(code) => {
                (self.check_department(code).await, "department check error")
            }
            MonitorTarget::Doctor(code) => (self.check_doctor(code).await, "doctor check error"),
        };

        match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.reporter.report(context, &e).await;
                None
            }
        }
    }

    /// Load code names, from the cached catalog when there is one.
    pub async fn refresh_catalog(&self) {
        if let Err(e) = self.try_refresh_catalog().await {
            self.reporter.report("catalog refresh error", &e).await;
        }
    }

    async fn try_refresh_catalog(&self) -> TrackerResult<()> {
        let catalog = match self.store.load::<DeptCatalog>(QueryKind::Catalog).await {
            Some(cached) if !cached.is_empty() => {
                tracing::info!("Using cached code catalog");
                cached
            }
            _ => {
                tracing::info!("Fetching code catalog");
                let Some(fetched) = self
                    .client
                    .call::<DeptCatalog>(CATALOG_ENDPOINT, &json!({}))
                    .await?
                else {
                    return Ok(());
                };
                self.persist(QueryKind::Catalog, &fetched).await;
                fetched
            }
        };

        let count = self.names.update_from_catalog(&catalog);
        tracing::info!("Loaded {} names from the code catalog", count);
        Ok(())
    }

    async fn persist<T: serde::Serialize>(&self, kind: QueryKind, value: &T) {
        if let Err(e) = self.store.save(kind, value).await {
            tracing::error!("Failed to save {} snapshot: {}", kind.file_stem(), e);
        }
    }

    pub async fn check_department(&self, dept_code: &str) -> TrackerResult<CheckOutcome> {
        let dept_name = self.names.display_name(dept_code);
        tracing::info!("Checking department {}", dept_name);

        let Some(schedule) = self
            .client
            .call::<DeptSchedule>(DEPARTMENT_ENDPOINT, &json!({ "deptCode": dept_code }))
            .await?
        else {
            return Ok(CheckOutcome::Skipped);
        };

        let previous = self.store.load::<DeptSchedule>(QueryKind::Department).await;
        let changed = department_changed(previous.as_ref(), &schedule);
        self.persist(QueryKind::Department, &schedule).await;

        if !changed {
            tracing::info!("Availability unchanged, skipping notification");
            return Ok(CheckOutcome::Unchanged);
        }

        let available: Vec<_> = schedule.available_slots().collect();
        if available.is_empty() {
            tracing::info!("No slots available");
            return Ok(CheckOutcome::Changed { notified: false });
        }

        let mut body = format!("# {}可预约医生\n\n", dept_name);
        for slot in &available {
            body.push_str(&format!(
                "- 医生: {}, 日期: {}, 详情: {}\n",
                self.names.display_name(&slot.doc_code),
                slot.day,
                slot.resource_memo
            ));
        }
        body.push('\n');

        tracing::info!("Availability changed, notifying:\n{}", body);
        self.notifier.notify(DEPARTMENT_TITLE, &body).await;

        Ok(CheckOutcome::Changed { notified: true })
    }

    pub async fn check_doctor(&self, doc_code: &str) -> TrackerResult<CheckOutcome> {
        let doc_name = self.names.display_name(doc_code);
        tracing::info!("Checking open days of doctor {}", doc_name);

        let Some(schedule) = self
            .client
            .call::<DoctorSchedule>(DOCTOR_ENDPOINT, &json!({ "docCode": doc_code }))
            .await?
        else {
            return Ok(CheckOutcome::Skipped);
        };

        let days: Vec<&DoctorDay> = schedule
            .doc_resource_day_list
            .iter()
            .filter(|day| day.bookable())
            .collect();

        // No bookable day is an empty slot list, so a later reopening compares as changed
        let slots: Vec<AvailableSlot> = if days.is_empty() {
            tracing::info!("Doctor {} has no bookable days", doc_name);
            Vec::new()
        } else {
            tracing::info!("Found {} bookable days, checking slots", days.len());
            let per_day = join_all(
                days.iter()
                    .map(|day| self.check_doctor_day(doc_code, &doc_name, &day.date)),
            )
            .await;
            per_day.into_iter().flatten().collect()
        };

        let previous = self.store.load::<Vec<AvailableSlot>>(QueryKind::Doctor).await;
        let changed = doctor_changed(previous.as_deref(), &slots);
        self.persist(QueryKind::Doctor, &slots).await;

        if days.is_empty() {
            return Ok(CheckOutcome::NoBookableDays);
        }

        if !changed {
            tracing::info!("Availability unchanged, skipping notification");
            return Ok(CheckOutcome::Unchanged);
        }

        if slots.is_empty() {
            tracing::info!("No slots available");
            return Ok(CheckOutcome::Changed { notified: false });
        }

        let body = render_doctor_slots(&doc_name, &slots);
        tracing::info!("Availability changed:\n{}", body);

        let title = if any_first_visit(&slots) {
            format!("{}初诊可预约", doc_name)
        } else if !self.notify_haji_only {
            format!("{}可预约", doc_name)
        } else {
            tracing::info!("Only returning-patient slots open, not notifying");
            return Ok(CheckOutcome::Changed { notified: false });
        };

        self.notifier.notify(&title, &body).await;
        Ok(CheckOutcome::Changed { notified: true })
    }

    /// Open slots of one day. A failed day contributes nothing.
    async fn check_doctor_day(&self, doc_code: &str, doc_name: &str, date: &str) -> Vec<AvailableSlot> {
        tracing::debug!("Checking slots of {} on {}", doc_name, date);

        let result = self
            .client
            .call::<DoctorSchedule>(
                DOCTOR_ENDPOINT,
                &json!({ "docCode": doc_code, "day": date }),
            )
            .await;

        match result {
            Ok(Some(schedule)) => schedule
                .doc_resource_resource_list
                .iter()
                .filter(|resource| resource.available())
                .map(|resource| AvailableSlot::from_resource(doc_name, date, resource))
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                let context = format!("day {} check error", date);
                self.reporter.report(&context, &e).await;
                Vec::new()
            }
        }
    }
}

fn weekday_name(date: &str) -> Option<&'static str> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(match date.weekday() {
        Weekday::Mon => "星期一",
        Weekday::Tue => "星期二",
        Weekday::Wed => "星期三",
        Weekday::Thu => "星期四",
        Weekday::Fri => "星期五",
        Weekday::Sat => "星期六",
        Weekday::Sun => "星期日",
    })
}

/// Markdown body listing slots per date; first-visit slots in bold.
pub fn render_doctor_slots(doc_name: &str, slots: &[AvailableSlot]) -> String {
    let mut body = format!("# {}可预约时段\n\n", doc_name);

    for (date, day_slots) in group_by_date(slots) {
        let heading = match weekday_name(date) {
            Some(weekday) => format!("## {} ({})\n\n", date, weekday),
            None => format!("## {}\n\n", date),
        };
        body.push_str(&heading);

        for slot in day_slots {
            let line = format!("{} {}", slot.time, slot.memo);
            if slot.haji {
                body.push_str(&format!("- **{}**\n", line));
            } else {
                body.push_str(&format!("- {}\n", line));
            }
        }
        body.push('\n');
    }

    body
}
