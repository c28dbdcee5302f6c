use crate::jobs::rerun::derive_rerun_targets;
use crate::menu::{MenuAction, MenuBuilder, MenuItemId, Navigation};
use crate::types::active::ActiveJobsSnapshot;
use crate::types::job::{JobDetail, format_start_time};
use crate::types::page::{
    JobSurface, MinionRow, OutputPanel, ResponseSummary, ResponseTable, RowAction, RowState,
    StatusCell,
};
use crate::{Command, JobDescriptor, JobStatus, Result, TargetType, util};

use serde_json::Value;

pub(crate) const LABEL_RERUN: &str = "Re-run job...";
pub(crate) const LABEL_RERUN_ALL: &str = "Re-run job on all minions...";
pub(crate) const LABEL_RERUN_UNSUCCESSFUL: &str = "Re-run job on unsuccessful minions...";
pub(crate) const LABEL_RERUN_FAILED: &str = "Re-run job on failed minions...";
pub(crate) const LABEL_RERUN_NON_RESPONDING: &str = "Re-run job on non responding minions...";
pub(crate) const LABEL_TERMINATE: &str = "Terminate job...";
pub(crate) const LABEL_KILL: &str = "Kill job...";
pub(crate) const LABEL_SIGNAL: &str = "Signal job...";

/// Menu items that only make sense while the job still runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct KillFamily {
    pub terminate: MenuItemId,
    pub kill: MenuItemId,
    pub signal: MenuItemId,
}

impl KillFamily {
    fn ids(&self) -> [MenuItemId; 3] {
        [self.terminate, self.kill, self.signal]
    }
}

/// State shared between the initial job render and later active-jobs updates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobViewHandle {
    jid: String,
    status: JobStatus,
    kill_family: KillFamily,
}

impl JobViewHandle {
    pub fn jid(&self) -> &str {
        &self.jid
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn kill_family(&self) -> KillFamily {
        self.kill_family
    }
}

/// Render a job-detail payload into the surface and the menu.
///
/// Returns a handle only when the payload described a job; transport and semantic errors are
/// rendered inline and end the view.
pub fn render_job_detail<S, M>(
    surface: &mut S,
    menu: &mut M,
    jid: &str,
    payload: Result<Value>,
) -> Option<JobViewHandle>
where
    S: JobSurface + ?Sized,
    M: MenuBuilder + ?Sized,
{
    surface.wire_close(Navigation::Back);

    let value = match payload {
        Ok(v) => v,
        Err(e) => {
            render_transport_error(surface, e.to_string());
            return None;
        }
    };

    let job = match JobDetail::from_value(jid, &value) {
        None => {
            render_transport_error(surface, util::payload_text(&value));
            return None;
        }
        Some(JobDetail::Failed {
            message,
            start_time,
        }) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(%jid, %message, "job detail returned an error");

            if let Some(output) = surface.output() {
                *output = OutputPanel::Message(format!("{message} ({jid})"));
            }
            set_text(surface.function(), "ERROR".to_string());
            set_text(surface.time(), format_start_time(start_time.as_deref()));
            return None;
        }
        Some(JobDetail::Job(job)) => job,
    };

    let command_text = job.command_text();
    add_rerun_items(menu, &job, &command_text);
    let kill_family = add_kill_family(menu, &job);

    set_text(surface.function(), job.summary_text());
    set_text(surface.time(), format_start_time(job.start_time.as_deref()));

    // Complete results make the active-jobs answer redundant.
    let status = if job.is_complete() {
        hide_kill_family(menu, &kill_family);
        JobStatus::Done
    } else {
        JobStatus::Loading
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        %jid,
        minions = job.minions.as_ref().map(Vec::len).unwrap_or(0),
        results = job.result.len(),
        %status,
        "job detail rendered"
    );

    if let Some(output) = surface.output() {
        *output = OutputPanel::Responses(response_table(&job, &status));
    }

    Some(JobViewHandle {
        jid: jid.to_string(),
        status,
        kill_family,
    })
}

/// Reconcile the view with an active-jobs payload.
///
/// A view in a terminal state (`done`, `(error)`) ignores the payload. A detached surface makes
/// this a no-op.
pub fn apply_active_jobs<S, M>(
    surface: &mut S,
    menu: &mut M,
    handle: &mut JobViewHandle,
    payload: Result<Value>,
) where
    S: JobSurface + ?Sized,
    M: MenuBuilder + ?Sized,
{
    if handle.status.is_terminal() {
        return;
    }
    let Some(output) = surface.output() else {
        return;
    };
    if output.status_mut().is_none() {
        return;
    }

    let snapshot = match payload {
        Ok(value) => match ActiveJobsSnapshot::from_value(&value) {
            Some(s) => Ok(s),
            None => Err(util::payload_text(&value)),
        },
        Err(e) => Err(e.to_string()),
    };

    let snapshot = match snapshot {
        Ok(s) => s,
        Err(raw) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(jid = %handle.jid, "active jobs poll failed");

            if let Some(cell) = output.status_mut() {
                cell.text = JobStatus::Error.to_string();
                cell.tooltip = Some(raw);
            }
            handle.status = JobStatus::Error;
            return;
        }
    };

    let Some(active) = snapshot.get(&handle.jid) else {
        if let Some(cell) = output.status_mut() {
            *cell = StatusCell::new(JobStatus::Done.to_string());
        }
        hide_kill_family(menu, &handle.kill_family);
        handle.status = JobStatus::Done;

        #[cfg(feature = "tracing")]
        tracing::info!(jid = %handle.jid, "job done");
        return;
    };

    let status = JobStatus::Active(active.active_count());
    if let Some(cell) = output.status_mut() {
        *cell = StatusCell::new(status.to_string());
    }

    for running in &active.running {
        let Some(row) = output.row_mut(&running.minion) else {
            continue;
        };
        if row.state != RowState::NoResponse {
            continue;
        }
        row.state = RowState::Active;
        row.actions = process_actions(&running.minion, running.pid);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(jid = %handle.jid, %status, "job still active");

    handle.status = status;
}

fn render_transport_error<S>(surface: &mut S, payload: String)
where
    S: JobSurface + ?Sized,
{
    #[cfg(feature = "tracing")]
    tracing::warn!(payload = %crate::error::truncate_for_error(&payload, 256), "job detail fetch failed");

    if let Some(output) = surface.output() {
        *output = OutputPanel::Error(payload);
    }
    set_text(surface.function(), "ERROR".to_string());
}

fn set_text(region: Option<&mut String>, text: String) {
    if let Some(region) = region {
        *region = text;
    }
}

fn add_rerun_items<M>(menu: &mut M, job: &JobDescriptor, command_text: &str)
where
    M: MenuBuilder + ?Sized,
{
    menu.add_item(
        LABEL_RERUN,
        MenuAction::Run(Command::new(
            job.target_type.clone(),
            job.target.clone(),
            command_text,
        )),
    );

    let targets = derive_rerun_targets(job);
    let subsets = [
        (LABEL_RERUN_ALL, targets.all_minions),
        (LABEL_RERUN_UNSUCCESSFUL, targets.unsuccessful),
        (LABEL_RERUN_FAILED, targets.failed),
        (LABEL_RERUN_NON_RESPONDING, targets.non_responding),
    ];
    for (label, minions) in subsets {
        let Some(minions) = minions else {
            continue;
        };
        menu.add_item(
            label,
            MenuAction::Run(Command::new(
                TargetType::List,
                minions.join(","),
                command_text,
            )),
        );
    }
}

fn add_kill_family<M>(menu: &mut M, job: &JobDescriptor) -> KillFamily
where
    M: MenuBuilder + ?Sized,
{
    let on_target = |text: String| {
        MenuAction::Run(Command::new(job.target_type.clone(), job.target.clone(), text))
    };
    let jid = &job.jid;
    KillFamily {
        terminate: menu.add_item(
            LABEL_TERMINATE,
            on_target(format!("saltutil.term_job {jid}")),
        ),
        kill: menu.add_item(LABEL_KILL, on_target(format!("saltutil.kill_job {jid}"))),
        signal: menu.add_item(
            LABEL_SIGNAL,
            on_target(format!(
                "saltutil.signal_job {jid} signal={}",
                crate::SIGNAL_PLACEHOLDER
            )),
        ),
    }
}

fn hide_kill_family<M>(menu: &mut M, kill_family: &KillFamily)
where
    M: MenuBuilder + ?Sized,
{
    for id in kill_family.ids() {
        menu.set_visible(id, false);
    }
}

/// `info`, `term`, `kill` and `signal` links for one running process.
fn process_actions(minion: &str, pid: u32) -> Vec<RowAction> {
    let on_minion = |label: &'static str, text: String| RowAction {
        label,
        command: Command::new(TargetType::List, minion, text),
    };
    vec![
        on_minion("info", format!("ps.proc_info {pid}")),
        on_minion("term", format!("ps.kill_pid {pid} signal=15")),
        on_minion("kill", format!("ps.kill_pid {pid} signal=9")),
        on_minion(
            "signal",
            format!("ps.kill_pid {pid} signal={}", crate::SIGNAL_PLACEHOLDER),
        ),
    ]
}

fn response_table(job: &JobDescriptor, status: &JobStatus) -> ResponseTable {
    let universe = job.minion_universe();
    let mut responded = 0;
    let mut failed = 0;

    let rows = universe
        .into_iter()
        .map(|minion| {
            let (state, output) = match job.result.get(&minion) {
                Some(result) => {
                    responded += 1;
                    let state = if result.is_ok() {
                        RowState::Ok
                    } else {
                        failed += 1;
                        RowState::Failed {
                            retcode: result.retcode,
                        }
                    };
                    (state, Some(render_return(&result.ret)))
                }
                None => (RowState::NoResponse, None),
            };
            MinionRow {
                minion,
                state,
                output,
                actions: Vec::new(),
            }
        })
        .collect::<Vec<_>>();

    ResponseTable {
        summary: ResponseSummary {
            total: rows.len(),
            responded,
            failed,
            status: StatusCell::new(status.to_string()),
        },
        rows,
    }
}

fn render_return(ret: &Value) -> String {
    match ret {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::menu::DropDownMenu;
    use crate::types::page::JobPage;
    use crate::Error;
    use serde_json::json;

    fn payload(minions: &[&str], results: serde_json::Value) -> Result<Value> {
        Ok(json!({
            "Function": "state.apply",
            "Arguments": ["nginx", {"__kwarg__": true, "test": true}],
            "Target": "web*",
            "Target-type": "glob",
            "StartTime": "2024, Jan 05 10:11:12.123456",
            "Minions": minions,
            "Result": results,
        }))
    }

    fn ok() -> Value {
        json!({"return": {"nginx": "ok"}, "retcode": 0, "success": true})
    }

    fn fail() -> Value {
        json!({"return": "boom", "retcode": 2, "success": false})
    }

    fn visible_labels(menu: &DropDownMenu) -> Vec<String> {
        menu.visible_items().map(|i| i.label.clone()).collect()
    }

    fn run_target(menu: &DropDownMenu, label: &str) -> (TargetType, String, String) {
        let item = menu.find(label).expect("menu item");
        let MenuAction::Run(cmd) = &item.action else {
            panic!("unexpected action: {:?}", item.action);
        };
        (cmd.target_type.clone(), cmd.target.clone(), cmd.text.clone())
    }

    #[test]
    fn complete_job_starts_done_and_hides_kill_family() {
        let mut page = JobPage::new();
        let mut menu = DropDownMenu::new();
        let handle = render_job_detail(
            &mut page,
            &mut menu,
            "42",
            payload(&["a", "b"], json!({"a": ok(), "b": ok()})),
        )
        .expect("handle");

        assert_eq!(handle.status(), &JobStatus::Done);
        assert_eq!(
            visible_labels(&menu),
            vec![LABEL_RERUN.to_string(), LABEL_RERUN_ALL.to_string()]
        );
        assert_eq!(
            run_target(&menu, LABEL_RERUN_ALL),
            (
                TargetType::List,
                "a,b".to_string(),
                "state.apply nginx test=true".to_string()
            )
        );
        assert_eq!(
            page.output_panel()
                .responses()
                .map(|t| t.summary.status.text.as_str()),
            Some("done")
        );
    }

    #[test]
    fn poll_never_moves_done_back_to_active() {
        let mut page = JobPage::new();
        let mut menu = DropDownMenu::new();
        let mut handle = render_job_detail(
            &mut page,
            &mut menu,
            "42",
            payload(&["a"], json!({"a": ok()})),
        )
        .expect("handle");

        apply_active_jobs(
            &mut page,
            &mut menu,
            &mut handle,
            Ok(json!({"42": {"Running": [{"a": 7}]}})),
        );

        assert_eq!(handle.status(), &JobStatus::Done);
        let table = page.output_panel().responses().expect("table");
        assert_eq!(table.summary.status.text, "done");
        assert!(menu.activate(handle.kill_family().kill).is_none());
    }

    #[test]
    fn mixed_job_offers_all_subsets_in_menu_order() {
        let mut page = JobPage::new();
        let mut menu = DropDownMenu::new();
        let handle = render_job_detail(
            &mut page,
            &mut menu,
            "42",
            payload(&["a", "b", "c"], json!({"a": ok(), "b": fail()})),
        )
        .expect("handle");

        assert_eq!(handle.status(), &JobStatus::Loading);
        assert_eq!(
            visible_labels(&menu),
            vec![
                LABEL_RERUN,
                LABEL_RERUN_ALL,
                LABEL_RERUN_UNSUCCESSFUL,
                LABEL_RERUN_FAILED,
                LABEL_RERUN_NON_RESPONDING,
                LABEL_TERMINATE,
                LABEL_KILL,
                LABEL_SIGNAL,
            ]
        );
        assert_eq!(run_target(&menu, LABEL_RERUN_UNSUCCESSFUL).1, "b,c");
        assert_eq!(run_target(&menu, LABEL_RERUN_FAILED).1, "b");
        assert_eq!(run_target(&menu, LABEL_RERUN_NON_RESPONDING).1, "c");
        assert_eq!(
            run_target(&menu, LABEL_RERUN),
            (
                TargetType::Glob,
                "web*".to_string(),
                "state.apply nginx test=true".to_string()
            )
        );
        assert_eq!(
            run_target(&menu, LABEL_SIGNAL).2,
            "saltutil.signal_job 42 signal=<signalnumber>"
        );

        assert_eq!(page.function_text(), "state.apply nginx test=true on web*");
        assert_eq!(page.time_text(), "2024-01-05 10:11:12");
        assert_eq!(page.close_target(), Some(&Navigation::Back));

        let table = page.output_panel().responses().expect("table");
        assert_eq!(table.summary.total, 3);
        assert_eq!(table.summary.responded, 2);
        assert_eq!(table.summary.failed, 1);
        assert_eq!(table.summary.status.text, "(loading)");
        assert_eq!(
            page.output_panel().row("b").map(|r| &r.state),
            Some(&RowState::Failed { retcode: Some(2) })
        );
    }

    #[test]
    fn absent_from_snapshot_turns_done_once() {
        let mut page = JobPage::new();
        let mut menu = DropDownMenu::new();
        let mut handle = render_job_detail(
            &mut page,
            &mut menu,
            "42",
            payload(&["a", "b"], json!({"a": ok()})),
        )
        .expect("handle");
        assert!(menu.activate(handle.kill_family().terminate).is_some());

        apply_active_jobs(&mut page, &mut menu, &mut handle, Ok(json!({"99": {}})));
        assert_eq!(handle.status(), &JobStatus::Done);
        for id in [
            handle.kill_family().terminate,
            handle.kill_family().kill,
            handle.kill_family().signal,
        ] {
            assert!(menu.activate(id).is_none());
        }

        // a later poll listing the job again is ignored
        apply_active_jobs(
            &mut page,
            &mut menu,
            &mut handle,
            Ok(json!({"42": {"Running": [{"b": 1}]}})),
        );
        assert_eq!(handle.status(), &JobStatus::Done);
        assert_eq!(
            page.output_panel().row("b").map(|r| &r.state),
            Some(&RowState::NoResponse)
        );
    }

    #[test]
    fn running_minion_gets_process_actions() {
        let mut page = JobPage::new();
        let mut menu = DropDownMenu::new();
        let mut handle = render_job_detail(
            &mut page,
            &mut menu,
            "42",
            payload(&["m0", "m1"], json!({"m0": ok()})),
        )
        .expect("handle");

        apply_active_jobs(
            &mut page,
            &mut menu,
            &mut handle,
            Ok(json!({"42": {"Running": [{"m1": 111}]}})),
        );

        assert_eq!(handle.status(), &JobStatus::Active(1));
        let table = page.output_panel().responses().expect("table");
        assert_eq!(table.summary.status.text, "1 active");

        let row = page.output_panel().row("m1").expect("row");
        assert_eq!(row.state, RowState::Active);
        let texts = row
            .actions
            .iter()
            .map(|a| (a.label, a.command.text.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            texts,
            vec![
                ("info", "ps.proc_info 111"),
                ("term", "ps.kill_pid 111 signal=15"),
                ("kill", "ps.kill_pid 111 signal=9"),
                ("signal", "ps.kill_pid 111 signal=<signalnumber>"),
            ]
        );
        for action in &row.actions {
            assert_eq!(action.command.target_type, TargetType::List);
            assert_eq!(action.command.target, "m1");
        }
        assert!(menu.activate(handle.kill_family().kill).is_some());
    }

    #[test]
    fn repeated_active_poll_does_not_duplicate_actions() {
        let mut page = JobPage::new();
        let mut menu = DropDownMenu::new();
        let mut handle = render_job_detail(
            &mut page,
            &mut menu,
            "42",
            payload(&["m1", "m2"], json!({})),
        )
        .expect("handle");

        for _ in 0..2 {
            apply_active_jobs(
                &mut page,
                &mut menu,
                &mut handle,
                Ok(json!({"42": {"Running": [{"m1": 5}, {"m2": 6}]}})),
            );
        }
        assert_eq!(handle.status(), &JobStatus::Active(2));
        assert_eq!(page.output_panel().row("m1").map(|r| r.actions.len()), Some(4));
    }

    #[test]
    fn transport_error_renders_raw_payload() {
        let mut page = JobPage::new();
        let mut menu = DropDownMenu::new();
        let handle = render_job_detail(&mut page, &mut menu, "42", Ok(json!("502 Bad Gateway")));

        assert!(handle.is_none());
        assert_eq!(
            page.output_panel(),
            &OutputPanel::Error("502 Bad Gateway".to_string())
        );
        assert_eq!(page.function_text(), "ERROR");
        assert!(menu.items().is_empty());

        let mut page = JobPage::new();
        let handle = render_job_detail(
            &mut page,
            &mut menu,
            "42",
            Err(Error::Timeout {
                action: "job_detail",
                timeout: std::time::Duration::from_secs(1),
            }),
        );
        assert!(handle.is_none());
        let OutputPanel::Error(text) = page.output_panel() else {
            panic!("unexpected output: {:?}", page.output_panel());
        };
        assert!(text.contains("job_detail"));
    }

    #[test]
    fn semantic_error_renders_message_and_time() {
        let mut page = JobPage::new();
        let mut menu = DropDownMenu::new();
        let handle = render_job_detail(
            &mut page,
            &mut menu,
            "42",
            Ok(json!({"Error": "Cannot contact returner", "StartTime": "2024, Jan 05 10:11:12.1"})),
        );

        assert!(handle.is_none());
        assert_eq!(
            page.output_panel(),
            &OutputPanel::Message("Cannot contact returner (42)".to_string())
        );
        assert_eq!(page.function_text(), "ERROR");
        assert_eq!(page.time_text(), "2024-01-05 10:11:12");
    }

    #[test]
    fn malformed_active_payload_marks_error_and_is_terminal() {
        let mut page = JobPage::new();
        let mut menu = DropDownMenu::new();
        let mut handle = render_job_detail(
            &mut page,
            &mut menu,
            "42",
            payload(&["a", "b"], json!({"a": ok()})),
        )
        .expect("handle");

        apply_active_jobs(&mut page, &mut menu, &mut handle, Ok(json!(["nope"])));
        assert_eq!(handle.status(), &JobStatus::Error);
        let status = &page.output_panel().responses().expect("table").summary.status;
        assert_eq!(status.text, "(error)");
        assert_eq!(status.tooltip.as_deref(), Some("[\"nope\"]"));

        // rows and menu from the detail panel stay untouched
        assert_eq!(page.output_panel().row("a").map(|r| &r.state), Some(&RowState::Ok));
        assert!(menu.activate(handle.kill_family().kill).is_some());

        apply_active_jobs(&mut page, &mut menu, &mut handle, Ok(json!({})));
        assert_eq!(handle.status(), &JobStatus::Error);
    }

    #[test]
    fn detached_page_ignores_late_active_poll() {
        let mut page = JobPage::new();
        let mut menu = DropDownMenu::new();
        let mut handle = render_job_detail(
            &mut page,
            &mut menu,
            "42",
            payload(&["a", "b"], json!({"a": ok()})),
        )
        .expect("handle");

        page.detach();
        apply_active_jobs(&mut page, &mut menu, &mut handle, Ok(json!({})));
        assert_eq!(handle.status(), &JobStatus::Loading);
        assert!(menu.activate(handle.kill_family().kill).is_some());
    }
}
