use crate::jobs::recent;
use crate::menu::{DropDownMenu, MenuAction, MenuBuilder, Navigation};
use crate::types::pillars::{MinionPillars, MinionState, PillarRow, PillarsSurface};
use crate::{Error, Result, util};

use futures_util::future::Either;
use serde_json::Value;
use std::sync::Arc;

pub(crate) const LABEL_SHOW_PILLARS: &str = "Show pillars";

#[derive(Clone, Debug)]
/// Pillar overview APIs.
pub struct Pillars {
    inner: Arc<crate::Inner>,
}

impl Pillars {
    pub(crate) fn new(inner: Arc<crate::Inner>) -> Self {
        Self { inner }
    }

    /// Enter the pillars view.
    ///
    /// The key list and the pillar data are fetched concurrently; the key list is always applied
    /// first and the pillar data only when the key list produced minion rows. The jobs panel is
    /// filled alongside from the job list, with statuses from the active jobs once the job list
    /// is in. Failures are rendered into `surface`.
    pub async fn open<S>(&self, surface: &mut S)
    where
        S: PillarsSurface + ?Sized,
    {
        #[cfg(feature = "tracing")]
        tracing::info!("open pillars view");

        let api = &self.inner.api;
        let keys = api.key_list_all();
        let pillars = api.pillar_obfuscate();
        let jobs_fetch = futures_util::future::join(api.list_jobs(), api.active_jobs());

        let table = async {
            match futures_util::future::select(keys, pillars).await {
                Either::Left((keys, pillars)) => {
                    if let Some(minions) = render_key_list(surface, keys) {
                        apply_pillars(surface, &minions, pillars.await);
                    }
                }
                Either::Right((pillars, keys)) => {
                    if let Some(minions) = render_key_list(surface, keys.await) {
                        apply_pillars(surface, &minions, pillars);
                    }
                }
            }
        };
        let ((), (jobs, active)) = futures_util::future::join(table, jobs_fetch).await;

        if let Some(panel) = surface.jobs_panel()
            && recent::render_recent_jobs(panel, jobs)
        {
            recent::apply_recent_active(panel, active);
        }
    }

    /// Pillar summary of every accepted minion, sorted by minion id.
    ///
    /// A failed key list is an error; a failed pillar query is reported per minion.
    pub async fn list(&self) -> Result<Vec<MinionPillars>> {
        let api = &self.inner.api;
        let (keys, pillars) =
            futures_util::future::join(api.key_list_all(), api.pillar_obfuscate()).await;

        let keys = keys?;
        let minions = parse_key_list(&keys).ok_or_else(|| {
            Error::parse_error("key list is not an object of minion lists", keys.to_string())
        })?;
        Ok(pillar_summaries(&minions, pillars))
    }
}

/// Accepted minions of a `key.list_all` answer, sorted.
pub(crate) fn parse_key_list(value: &Value) -> Option<Vec<String>> {
    let obj = value.as_object()?;
    let mut minions = match obj.get("minions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()?,
        Some(_) => return None,
    };
    minions.sort();
    Some(minions)
}

/// Render the key list as preliminary rows. Returns the minion ids, or `None` when the table
/// shows an error instead (or the page is gone).
pub fn render_key_list<S>(surface: &mut S, payload: Result<Value>) -> Option<Vec<String>>
where
    S: PillarsSurface + ?Sized,
{
    let minions = match &payload {
        Ok(value) => parse_key_list(value).ok_or_else(|| util::payload_text(value)),
        Err(e) => Err(e.to_string()),
    };

    let table = surface.minion_table()?;
    let minions = match minions {
        Ok(m) => m,
        Err(raw) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("key list fetch failed");

            table.rows.clear();
            table.error = Some(raw);
            return None;
        }
    };

    table.error = None;
    table.rows = minions.iter().map(|minion| preliminary_row(minion)).collect();

    if let Some(message) = surface.message() {
        *message = util::txt_zero_one_many(minions.len(), "No minions", "1 minion", "{0} minions");
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(minions = minions.len(), "key list rendered");

    Some(minions)
}

/// Fill the pillar column of the rows created by `render_key_list`.
pub fn apply_pillars<S>(surface: &mut S, minions: &[String], payload: Result<Value>)
where
    S: PillarsSurface + ?Sized,
{
    let Some(table) = surface.minion_table() else {
        return;
    };

    for summary in pillar_summaries(minions, payload) {
        let Some(row) = table.row_mut(&summary.minion) else {
            continue;
        };
        row.state = summary.state;
        row.pillar_info = match summary.pillar_count {
            Some(n) => util::txt_zero_one_many(n, "no pillars", "1 pillar", "{0} pillars"),
            None => String::new(),
        };
        row.sort_key = match summary.pillar_count {
            Some(n) => i64::try_from(n).unwrap_or(i64::MAX),
            None => -1,
        };
        row.error = summary.error;
    }
}

fn preliminary_row(minion: &str) -> PillarRow {
    let link = Navigation::Path(format!(
        "pillarsminion?minion={}",
        util::encode_uri_component(minion)
    ));
    let mut menu = DropDownMenu::new();
    menu.add_item(LABEL_SHOW_PILLARS, MenuAction::Navigate(link.clone()));

    PillarRow {
        minion: minion.to_string(),
        state: MinionState::Accepted,
        pillar_info: String::new(),
        sort_key: -1,
        error: None,
        menu,
        link,
    }
}

fn pillar_summaries(minions: &[String], payload: Result<Value>) -> Vec<MinionPillars> {
    let value = match payload {
        Ok(v) => v,
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %e, "pillar fetch failed");

            let text = e.to_string();
            return minions
                .iter()
                .map(|minion| MinionPillars {
                    minion: minion.clone(),
                    state: MinionState::Accepted,
                    pillar_count: None,
                    error: Some(text.clone()),
                })
                .collect();
        }
    };

    let Some(answers) = value.as_object() else {
        let text = util::payload_text(&value);
        return minions
            .iter()
            .map(|minion| MinionPillars {
                minion: minion.clone(),
                state: MinionState::Accepted,
                pillar_count: None,
                error: Some(text.clone()),
            })
            .collect();
    };

    minions
        .iter()
        .map(|minion| match answers.get(minion) {
            None => MinionPillars {
                minion: minion.clone(),
                state: MinionState::Offline,
                pillar_count: None,
                error: None,
            },
            Some(Value::Object(pillars)) => MinionPillars {
                minion: minion.clone(),
                state: MinionState::Online,
                pillar_count: Some(pillars.len()),
                error: None,
            },
            Some(other) => MinionPillars {
                minion: minion.clone(),
                state: MinionState::Online,
                pillar_count: None,
                error: Some(util::payload_text(other)),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::types::pillars::PillarsPage;
    use serde_json::json;

    fn keys(minions: &[&str]) -> Result<Value> {
        Ok(json!({
            "minions": minions,
            "minions_pre": ["pending"],
            "minions_rejected": [],
            "minions_denied": [],
        }))
    }

    #[test]
    fn key_list_creates_sorted_rows_with_navigation() {
        let mut page = PillarsPage::new();
        let minions = render_key_list(&mut page, keys(&["web2", "db 1", "web1"])).expect("rows");
        assert_eq!(minions, vec!["db 1", "web1", "web2"]);

        let rows = &page.table().rows;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].minion, "db 1");
        assert_eq!(rows[0].state, MinionState::Accepted);
        assert_eq!(
            rows[0].link,
            Navigation::Path("pillarsminion?minion=db%201".to_string())
        );
        let item = rows[0].menu.find(LABEL_SHOW_PILLARS).expect("menu item");
        assert_eq!(item.action, MenuAction::Navigate(rows[0].link.clone()));
        assert_eq!(page.message_text(), "3 minions");
    }

    #[test]
    fn key_list_message_uses_zero_one_many() {
        let mut page = PillarsPage::new();
        render_key_list(&mut page, keys(&[])).expect("rows");
        assert_eq!(page.message_text(), "No minions");

        let mut page = PillarsPage::new();
        render_key_list(&mut page, keys(&["m1"])).expect("rows");
        assert_eq!(page.message_text(), "1 minion");
    }

    #[test]
    fn key_list_failure_shows_error_row_and_stops() {
        let mut page = PillarsPage::new();
        assert!(render_key_list(&mut page, Ok(json!("no access"))).is_none());
        assert_eq!(page.table().error.as_deref(), Some("no access"));
        assert!(page.table().rows.is_empty());
        assert_eq!(page.message_text(), "");
    }

    #[test]
    fn pillars_fill_counts_errors_and_offline_minions() {
        let mut page = PillarsPage::new();
        let minions = render_key_list(&mut page, keys(&["a", "b", "c", "d"])).expect("rows");
        apply_pillars(
            &mut page,
            &minions,
            Ok(json!({
                "a": {},
                "b": {"role": "web", "env": "prod"},
                "c": "Pillar render error: boom",
                "stranger": {"x": 1},
            })),
        );

        let table = page.table();
        let a = table.row("a").expect("a");
        assert_eq!(a.state, MinionState::Online);
        assert_eq!(a.pillar_info, "no pillars");
        assert_eq!(a.sort_key, 0);

        let b = table.row("b").expect("b");
        assert_eq!(b.pillar_info, "2 pillars");
        assert_eq!(b.sort_key, 2);

        let c = table.row("c").expect("c");
        assert_eq!(c.pillar_info, "");
        assert_eq!(c.sort_key, -1);
        assert_eq!(c.error.as_deref(), Some("Pillar render error: boom"));

        let d = table.row("d").expect("d");
        assert_eq!(d.state, MinionState::Offline);
        assert_eq!(d.pillar_info, "");

        assert!(table.row("stranger").is_none());
    }

    #[test]
    fn pillar_fetch_failure_marks_every_minion() {
        let mut page = PillarsPage::new();
        let minions = render_key_list(&mut page, keys(&["a", "b"])).expect("rows");
        apply_pillars(
            &mut page,
            &minions,
            Err(Error::IoError {
                context: "boom".to_string(),
            }),
        );
        for row in &page.table().rows {
            assert_eq!(row.error.as_deref(), Some("io error: boom"));
        }
    }

    #[test]
    fn detached_page_ignores_late_handlers() {
        let mut page = PillarsPage::new();
        page.detach();
        assert!(render_key_list(&mut page, keys(&["a"])).is_none());
        apply_pillars(&mut page, &["a".to_string()], Ok(json!({"a": {}})));
        assert!(page.table().rows.is_empty());
    }

    #[test]
    fn parse_key_list_rejects_non_string_minions() {
        assert_eq!(parse_key_list(&json!({"minions": [1]})), None);
        assert_eq!(parse_key_list(&json!({})), Some(Vec::new()));
        assert_eq!(parse_key_list(&json!([])), None);
    }
}
