// End-to-end view tests against an in-memory Salt master.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use saltview::{
    BoxFuture, Command, DropDownMenu, JobPage, JobStatus, MinionState, OutputPanel, PillarsPage,
    RowState, SaltApi, SaltView, SaltViewOptions, TargetType,
};

fn block_on<T>(fut: impl Future<Output = T>) -> T {
    #[cfg(feature = "rt-async-io")]
    {
        smol::block_on(fut)
    }

    #[cfg(feature = "rt-tokio")]
    {
        let rt = tokio::runtime::Runtime::new().expect("init tokio runtime");
        rt.block_on(fut)
    }
}

#[derive(Clone, Debug)]
enum Reply {
    Ok(Value),
    Fail(String),
}

impl Reply {
    fn to_result(&self) -> saltview::Result<Value> {
        match self {
            Reply::Ok(v) => Ok(v.clone()),
            Reply::Fail(context) => Err(saltview::Error::IoError {
                context: context.clone(),
            }),
        }
    }
}

#[derive(Debug, Default)]
struct FakeMaster {
    detail: Mutex<Option<Reply>>,
    // The last reply repeats once the queue is down to one entry.
    active: Mutex<VecDeque<Reply>>,
    keys: Mutex<Option<Reply>>,
    pillars: Mutex<Option<Reply>>,
    jobs: Mutex<Option<Reply>>,
    dispatched: Mutex<Vec<Command>>,
    active_calls: AtomicUsize,
}

impl FakeMaster {
    fn with_detail(detail: Value) -> Arc<Self> {
        let fake = Self::default();
        *fake.detail.lock().unwrap() = Some(Reply::Ok(detail));
        Arc::new(fake)
    }

    fn push_active(&self, reply: Reply) {
        self.active.lock().unwrap().push_back(reply);
    }

    fn next_active(&self) -> saltview::Result<Value> {
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.active.lock().unwrap();
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        reply.unwrap_or(Reply::Ok(json!({}))).to_result()
    }

    fn answer(slot: &Mutex<Option<Reply>>) -> saltview::Result<Value> {
        slot.lock()
            .unwrap()
            .clone()
            .unwrap_or(Reply::Fail("no reply configured".to_string()))
            .to_result()
    }
}

impl SaltApi for FakeMaster {
    fn job_detail(&self, _jid: String) -> BoxFuture<'_, saltview::Result<Value>> {
        let r = Self::answer(&self.detail);
        Box::pin(async move { r })
    }

    fn active_jobs(&self) -> BoxFuture<'_, saltview::Result<Value>> {
        let r = self.next_active();
        Box::pin(async move { r })
    }

    fn list_jobs(&self) -> BoxFuture<'_, saltview::Result<Value>> {
        let r = Self::answer(&self.jobs);
        Box::pin(async move { r })
    }

    fn key_list_all(&self) -> BoxFuture<'_, saltview::Result<Value>> {
        let r = Self::answer(&self.keys);
        Box::pin(async move { r })
    }

    fn pillar_obfuscate(&self) -> BoxFuture<'_, saltview::Result<Value>> {
        let r = Self::answer(&self.pillars);
        Box::pin(async move { r })
    }

    fn run_command(&self, command: Command) -> BoxFuture<'_, saltview::Result<Option<String>>> {
        self.dispatched.lock().unwrap().push(command);
        Box::pin(async move { Ok(Some("20240105101500000001".to_string())) })
    }
}

fn view(fake: &Arc<FakeMaster>) -> SaltView {
    let mut opts = SaltViewOptions::default();
    opts.active_poll_initial = Duration::from_millis(5);
    opts.active_poll_max = Duration::from_millis(20);
    SaltView::with_api(opts, Arc::clone(fake))
}

fn running_job() -> Value {
    json!({
        "Function": "state.apply",
        "Arguments": [],
        "Target": ["m0", "m1"],
        "Target-type": "list",
        "StartTime": "2024, Jan 05 10:11:12.123456",
        "User": "root",
        "Minions": ["m0", "m1"],
        "Result": {"m0": {"return": true, "retcode": 0, "success": true}},
    })
}

const JID: &str = "20240105101112123456";

fn status_text(page: &JobPage) -> Option<String> {
    page.output_panel()
        .responses()
        .map(|t| t.summary.status.text.clone())
}

#[test]
fn open_renders_detail_then_live_status() {
    let fake = FakeMaster::with_detail(running_job());
    fake.push_active(Reply::Ok(json!({JID: {"Running": [{"m1": 111}]}})));
    let view = view(&fake);

    let mut page = JobPage::new();
    let mut menu = DropDownMenu::new();
    let handle = block_on(view.jobs().open(JID, &mut page, &mut menu))
        .expect("open")
        .expect("handle");

    assert_eq!(handle.status(), &JobStatus::Active(1));
    assert_eq!(status_text(&page).as_deref(), Some("1 active"));
    assert_eq!(page.time_text(), "2024-01-05 10:11:12");

    let row = page.output_panel().row("m1").expect("row");
    assert_eq!(row.state, RowState::Active);
    assert_eq!(row.actions.len(), 4);
    assert!(menu.activate(handle.kill_family().terminate).is_some());
}

#[test]
fn open_from_query_decodes_the_id_parameter() {
    let fake = FakeMaster::with_detail(running_job());
    let view = view(&fake);

    let mut page = JobPage::new();
    let mut menu = DropDownMenu::new();
    let handle = block_on(view.jobs().open_from_query(
        &format!("?x=1&id={JID}"),
        &mut page,
        &mut menu,
    ))
    .expect("open")
    .expect("handle");
    assert_eq!(handle.jid(), JID);

    let err = block_on(view.jobs().open_from_query("x=1", &mut page, &mut menu))
        .expect_err("missing id");
    let saltview::Error::InvalidInput { .. } = err else {
        panic!("unexpected error: {err:?}");
    };
}

#[test]
fn semantic_error_ends_the_view_without_status() {
    let fake = FakeMaster::with_detail(json!({
        "Error": "Cannot contact returner or no job with this jid",
        "StartTime": "2024, Jan 05 10:11:12.123456",
    }));
    let view = view(&fake);

    let mut page = JobPage::new();
    let mut menu = DropDownMenu::new();
    let handle = block_on(view.jobs().open(JID, &mut page, &mut menu)).expect("open");

    assert!(handle.is_none());
    assert_eq!(page.function_text(), "ERROR");
    assert_eq!(
        page.output_panel(),
        &OutputPanel::Message(format!(
            "Cannot contact returner or no job with this jid ({JID})"
        ))
    );
    assert!(menu.items().is_empty());

    let err = block_on(view.jobs().detail(JID)).expect_err("job error");
    let saltview::Error::JobError { jid, .. } = err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(jid, JID);
}

#[test]
fn watch_polls_until_done_and_hides_kill_family() {
    let fake = FakeMaster::with_detail(running_job());
    fake.push_active(Reply::Ok(json!({JID: {"Running": [{"m1": 111}]}})));
    fake.push_active(Reply::Ok(json!({JID: {"Running": [{"m1": 111}]}})));
    fake.push_active(Reply::Ok(json!({"other": {"Running": []}})));
    let view = view(&fake);

    let mut page = JobPage::new();
    let mut menu = DropDownMenu::new();
    let mut handle = block_on(view.jobs().open(JID, &mut page, &mut menu))
        .expect("open")
        .expect("handle");

    let status = block_on(view.jobs().watch(
        &mut handle,
        &mut page,
        &mut menu,
        Duration::from_secs(5),
    ))
    .expect("watch");

    assert_eq!(status, JobStatus::Done);
    assert_eq!(status_text(&page).as_deref(), Some("done"));
    assert!(menu.activate(handle.kill_family().kill).is_none());

    let calls = fake.active_calls.load(Ordering::SeqCst);
    let status = block_on(view.jobs().refresh_active(&mut handle, &mut page, &mut menu));
    assert_eq!(status, JobStatus::Done);
    assert_eq!(fake.active_calls.load(Ordering::SeqCst), calls);
}

#[test]
fn watch_times_out_while_the_job_keeps_running() {
    let fake = FakeMaster::with_detail(running_job());
    fake.push_active(Reply::Ok(json!({JID: {"Running": [{"m1": 111}]}})));
    let view = view(&fake);

    let mut page = JobPage::new();
    let mut menu = DropDownMenu::new();
    let mut handle = block_on(view.jobs().open(JID, &mut page, &mut menu))
        .expect("open")
        .expect("handle");

    let err = block_on(view.jobs().watch(
        &mut handle,
        &mut page,
        &mut menu,
        Duration::from_millis(60),
    ))
    .expect_err("timeout");
    let saltview::Error::JobTimeout { jid, .. } = err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(jid, JID);
    assert_eq!(handle.status(), &JobStatus::Active(1));
}

#[test]
fn failed_active_poll_marks_error_and_keeps_the_detail() {
    let fake = FakeMaster::with_detail(running_job());
    fake.push_active(Reply::Fail("master unreachable".to_string()));
    let view = view(&fake);

    let mut page = JobPage::new();
    let mut menu = DropDownMenu::new();
    let handle = block_on(view.jobs().open(JID, &mut page, &mut menu))
        .expect("open")
        .expect("handle");

    assert_eq!(handle.status(), &JobStatus::Error);
    let table = page.output_panel().responses().expect("table");
    assert_eq!(table.summary.status.text, "(error)");
    assert_eq!(
        table.summary.status.tooltip.as_deref(),
        Some("io error: master unreachable")
    );
    assert!(page.output_panel().row("m0").is_some());
}

#[test]
fn run_rejects_unfilled_signal_and_dispatches_filled_one() {
    let fake = FakeMaster::with_detail(running_job());
    let view = view(&fake);

    let command = Command::new(
        TargetType::List,
        "m1",
        "ps.kill_pid 111 signal=<signalnumber>",
    );
    let err = block_on(view.jobs().run(&command)).expect_err("placeholder");
    let saltview::Error::InvalidInput { .. } = err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(fake.dispatched.lock().unwrap().is_empty());

    let jid = block_on(view.jobs().run(&command.with_signal(9))).expect("run");
    assert_eq!(jid.as_deref(), Some("20240105101500000001"));
    let dispatched = fake.dispatched.lock().unwrap();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].text, "ps.kill_pid 111 signal=9");
}

#[test]
fn pillars_view_combines_key_list_and_pillar_data() {
    let fake = Arc::new(FakeMaster::default());
    *fake.keys.lock().unwrap() = Some(Reply::Ok(json!({
        "minions": ["web2", "web1", "db1"],
        "minions_pre": [],
        "minions_rejected": [],
        "minions_denied": [],
    })));
    *fake.pillars.lock().unwrap() = Some(Reply::Ok(json!({
        "web1": {"role": "web"},
        "db1": "Rendering SLS 'top' failed",
    })));
    let view = view(&fake);

    let mut page = PillarsPage::new();
    block_on(view.pillars().open(&mut page));

    assert_eq!(page.message_text(), "3 minions");
    let names = page
        .table()
        .rows
        .iter()
        .map(|r| r.minion.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["db1", "web1", "web2"]);

    let web1 = page.table().row("web1").expect("web1");
    assert_eq!(web1.pillar_info, "1 pillar");
    assert_eq!(web1.state, MinionState::Online);
    let web2 = page.table().row("web2").expect("web2");
    assert_eq!(web2.state, MinionState::Offline);
    let db1 = page.table().row("db1").expect("db1");
    assert_eq!(db1.sort_key, -1);
    assert_eq!(db1.error.as_deref(), Some("Rendering SLS 'top' failed"));

    let list = block_on(view.pillars().list()).expect("list");
    assert_eq!(list.len(), 3);
    assert_eq!(list[1].minion, "web1");
    assert_eq!(list[1].pillar_count, Some(1));
}

#[test]
fn pillars_view_shows_key_list_failure() {
    let fake = Arc::new(FakeMaster::default());
    *fake.keys.lock().unwrap() = Some(Reply::Fail("denied".to_string()));
    *fake.pillars.lock().unwrap() = Some(Reply::Ok(json!({})));
    let view = view(&fake);

    let mut page = PillarsPage::new();
    block_on(view.pillars().open(&mut page));
    assert_eq!(page.table().error.as_deref(), Some("io error: denied"));
    assert!(page.table().rows.is_empty());

    assert!(block_on(view.pillars().list()).is_err());
}

#[test]
fn pillars_view_lists_recent_jobs_with_status() {
    let fake = Arc::new(FakeMaster::default());
    *fake.keys.lock().unwrap() = Some(Reply::Ok(json!({"minions": ["web1"]})));
    *fake.pillars.lock().unwrap() = Some(Reply::Ok(json!({"web1": {}})));
    *fake.jobs.lock().unwrap() = Some(Reply::Ok(json!({
        "20240105101112000001": {"Function": "test.ping", "Target": "*", "Target-type": "glob"},
        "20240105101113000002": {"Function": "saltutil.find_job", "Target": ["web1"], "Target-type": "list"},
        JID: running_job(),
    })));
    fake.push_active(Reply::Ok(json!({
        JID: {"Function": "state.apply", "Running": [{"m0": 4242}]}
    })));
    let view = view(&fake);

    let mut page = PillarsPage::new();
    block_on(view.pillars().open(&mut page));

    assert_eq!(page.table().row("web1").expect("web1").pillar_info, "no pillars");
    let jids = page
        .jobs()
        .rows
        .iter()
        .map(|r| r.job.jid.as_str())
        .collect::<Vec<_>>();
    assert_eq!(jids, vec![JID, "20240105101112000001"]);
    let running = page.jobs().row(JID).expect("running job");
    assert_eq!(running.job.target, "m0,m1");
    assert_eq!(running.status.text, "1 active");
    assert_eq!(
        page.jobs().row("20240105101112000001").expect("ping").status.text,
        "done"
    );

    let recent = block_on(view.jobs().recent()).expect("recent");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].function, "state.apply");
}

#[test]
fn pillars_view_shows_job_list_failure_in_the_panel() {
    let fake = Arc::new(FakeMaster::default());
    *fake.keys.lock().unwrap() = Some(Reply::Ok(json!({"minions": []})));
    *fake.pillars.lock().unwrap() = Some(Reply::Ok(json!({})));
    *fake.jobs.lock().unwrap() = Some(Reply::Fail("runner denied".to_string()));
    let view = view(&fake);

    let mut page = PillarsPage::new();
    block_on(view.pillars().open(&mut page));

    assert_eq!(page.message_text(), "No minions");
    assert_eq!(page.jobs().error.as_deref(), Some("io error: runner denied"));
    assert!(page.jobs().rows.is_empty());
}

#[test]
fn capabilities_reflect_backend_answers() {
    let fake = Arc::new(FakeMaster::default());
    *fake.keys.lock().unwrap() = Some(Reply::Fail("denied".to_string()));
    let view = view(&fake);

    let caps = block_on(view.capabilities());
    assert!(caps.can_read_jobs);
    assert!(!caps.can_read_keys);
}
