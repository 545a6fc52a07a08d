use std::path::Path;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use serde_json::{json, Value};
use trellis_collections::VersionToken;
use trellis_records::{
    Change, CategoryMutator, EntityKey, EventMutator, MemberKey, RecordError, RosterMutator, Trellis,
    TrellisConfig,
};
use trellis_types::{AssetPayload, Record, RecordId};

use crate::cli::*;
use crate::render;

const DEFAULT_CONFIG: &str = "trellis.toml";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let trellis = Trellis::open(&config)?;
    let format = cli.format;
    match cli.command {
        Command::Sponsors(args) => cmd_records(trellis.sponsors(), args.action, format).await,
        Command::Lectures(args) => cmd_records(trellis.lectures(), args.action, format).await,
        Command::Notifications(args) => cmd_records(trellis.notifications(), args.action, format).await,
        Command::Users(args) => cmd_records(trellis.users(), args.action, format).await,
        Command::Events(args) => cmd_events(trellis.events(), args.action, format).await,
        Command::Roster(args) => cmd_roster(trellis.roster(), args.action, format).await,
        Command::Intents(args) => cmd_intents(&trellis, args.action, format).await,
        Command::Config => {
            print!("{}", config.to_redacted_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TrellisConfig> {
    let config = match path {
        Some(path) => TrellisConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => TrellisConfig::load(DEFAULT_CONFIG)?,
        None => TrellisConfig::default(),
    };
    Ok(config.with_env())
}

/// Parse one `--set KEY=VALUE`. Values that are valid JSON keep their type;
/// anything else is stored as text.
pub fn parse_assignment(pair: &str) -> anyhow::Result<(String, Value)> {
    let (key, raw) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got {pair:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("empty field name in {pair:?}");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

pub fn collect_fields(args: &FieldArgs) -> anyhow::Result<Record> {
    let mut fields = Record::new();
    if let Some(text) = &args.json {
        match serde_json::from_str(text).context("--json is not valid JSON")? {
            Value::Object(map) => fields.extend(map),
            _ => bail!("--json must be a JSON mapping"),
        }
    }
    for pair in &args.set {
        let (key, value) = parse_assignment(pair)?;
        fields.insert(key, value);
    }
    Ok(fields)
}

async fn build_change(args: &FieldArgs) -> anyhow::Result<Change> {
    let mut change = Change::new(collect_fields(args)?);
    if let Some(path) = &args.asset {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading asset {}", path.display()))?;
        change = change.with_asset(AssetPayload::from(bytes));
    }
    Ok(change)
}

/// Parse an id argument. A malformed id is invalid input, not an internal error.
fn parse_id(id: &str) -> anyhow::Result<RecordId> {
    Ok(RecordId::new(id).map_err(RecordError::from)?)
}

fn entity_key(category: String, id: &str) -> anyhow::Result<EntityKey> {
    Ok(EntityKey::new(category, parse_id(id)?))
}

fn emit(format: OutputFormat, value: Value, text: impl FnOnce() -> String) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}

fn done(format: OutputFormat, value: Value, message: String) -> anyhow::Result<()> {
    emit(format, value, || format!("{} {message}", "✓".green().bold()))
}

fn listing<'a>(records: impl IntoIterator<Item = (String, &'a Record)>) -> String {
    let lines: Vec<String> = records
        .into_iter()
        .map(|(key, record)| format!("{}\n{}", key.yellow().bold(), render::record(&Value::Object(record.clone()))))
        .collect();
    if lines.is_empty() {
        "No records.".to_string()
    } else {
        lines.join("\n")
    }
}

async fn cmd_records(records: &CategoryMutator, action: RecordAction, format: OutputFormat) -> anyhow::Result<()> {
    let entity = records.spec().name;
    match action {
        RecordAction::List { category: Some(category) } => {
            let found = records.list_category(&category).await?;
            emit(format, json!(found), || {
                listing(found.iter().map(|(id, r)| (format!("{category}/{id}"), r)))
            })
        }
        RecordAction::List { category: None } => {
            let all = records.list().await?;
            emit(format, json!(all), || {
                listing(all.iter().flat_map(|(category, entries)| {
                    entries.iter().map(move |(id, r)| (format!("{category}/{id}"), r))
                }))
            })
        }
        RecordAction::Get { category, id } => {
            let key = entity_key(category, &id)?;
            let record = Value::Object(records.get(&key).await?);
            emit(format, record.clone(), || format!("{}\n{}", key.to_string().yellow().bold(), render::record(&record)))
        }
        RecordAction::Create(fields) => {
            let key = records.create(build_change(&fields).await?).await?;
            done(format, json!({"key": key.to_string()}), format!("Created {entity} {}", key.to_string().yellow()))
        }
        RecordAction::Update { category, id, fields } => {
            let key = entity_key(category, &id)?;
            let stored = records.update(&key, build_change(&fields).await?).await?;
            let message = if stored == key {
                format!("Updated {entity} {}", key.to_string().yellow())
            } else {
                format!("Moved {entity} {} → {}", key, stored.to_string().yellow())
            };
            done(format, json!({"key": stored.to_string()}), message)
        }
        RecordAction::Delete { category, id } => {
            let key = entity_key(category, &id)?;
            records.delete(&key).await?;
            done(format, json!({"deleted": key.to_string()}), format!("Deleted {entity} {}", key.to_string().yellow()))
        }
    }
}

async fn cmd_events(events: &EventMutator, action: RecordAction, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        RecordAction::List { category: Some(category) } => {
            let found = events.list_category(&category).await?;
            emit(format, json!(found), || {
                listing(found.iter().map(|(id, r)| (format!("{category}/{id}"), r)))
            })
        }
        RecordAction::List { category: None } => {
            let all = events.list().await?;
            emit(format, json!(all), || {
                listing(all.iter().flat_map(|(category, entries)| {
                    entries.iter().map(move |(id, r)| (format!("{category}/{id}"), r))
                }))
            })
        }
        RecordAction::Get { category, id } => {
            let key = entity_key(category, &id)?;
            let both = events.get(&key).await?;
            let value = json!({"summary": both.summary, "detail": both.detail});
            emit(format, value.clone(), || {
                let mut out = key.to_string().yellow().bold().to_string();
                for side in ["summary", "detail"] {
                    out += &format!("\n {}\n", side.cyan());
                    out += &match &value[side] {
                        Value::Null => format!("  {}", "(missing)".red()),
                        shown => render::record(shown),
                    };
                }
                out
            })
        }
        RecordAction::Create(fields) => {
            let key = events.create(build_change(&fields).await?).await?;
            done(format, json!({"key": key.to_string()}), format!("Created event {}", key.to_string().yellow()))
        }
        RecordAction::Update { category, id, fields } => {
            let key = entity_key(category, &id)?;
            events.update(&key, build_change(&fields).await?).await?;
            done(format, json!({"key": key.to_string()}), format!("Updated event {}", key.to_string().yellow()))
        }
        RecordAction::Delete { category, id } => {
            let key = entity_key(category, &id)?;
            events.delete(&key).await?;
            done(format, json!({"deleted": key.to_string()}), format!("Deleted event {}", key.to_string().yellow()))
        }
    }
}

fn member_json(key: &MemberKey) -> Value {
    json!({"team": key.team, "index": key.index, "memberId": key.member_id.as_str()})
}

/// Resolve the version prefix a user copied from `roster list`.
async fn expect_version(roster: &RosterMutator, team: &str, expected: &str) -> anyhow::Result<VersionToken> {
    let current = roster.snapshot(team).await?.version;
    if expected.len() < 6 || !current.to_hex().starts_with(&expected.to_ascii_lowercase()) {
        bail!("roster {team} changed since version {expected} (now {current}); list it again");
    }
    Ok(current)
}

async fn cmd_roster(roster: &RosterMutator, action: RosterAction, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        RosterAction::Teams => {
            let teams = roster.teams().await?;
            emit(format, json!(teams), || {
                if teams.is_empty() {
                    "No teams.".to_string()
                } else {
                    teams.join("\n")
                }
            })
        }
        RosterAction::List { team } => {
            let snapshot = roster.snapshot(&team).await?;
            let value = json!({"version": snapshot.version.to_hex(), "members": snapshot.members});
            emit(format, value, || {
                let mut out = format!("{} {}", "version".dimmed(), snapshot.version);
                for (index, member) in snapshot.members.iter().enumerate() {
                    out += &format!(
                        "\n{}\n{}",
                        format!("[{index}]").yellow().bold(),
                        render::record(&Value::Object(member.clone()))
                    );
                }
                out
            })
        }
        RosterAction::Get { team, index } => {
            let member = Value::Object(roster.get(&team, index).await?);
            emit(format, member.clone(), || render::record(&member))
        }
        RosterAction::Add { team, fields } => {
            let key = roster.add(&team, build_change(&fields).await?).await?;
            done(format, member_json(&key), format!("Added {}", key.to_string().yellow()))
        }
        RosterAction::Update {
            team,
            index,
            member_id,
            expect_version: expected,
            fields,
        } => {
            let change = build_change(&fields).await?;
            let index = match (index, member_id, expected) {
                (_, Some(id), _) => roster.update_member(&team, &parse_id(&id)?, change).await?,
                (Some(index), None, Some(expected)) => {
                    let version = expect_version(roster, &team, &expected).await?;
                    roster.update_checked(&team, index, &version, change).await?;
                    index
                }
                (Some(index), None, None) => {
                    roster.update(&team, index, change).await?;
                    index
                }
                (None, None, _) => bail!("give a member INDEX or --member-id"),
            };
            done(format, json!({"team": team, "index": index}), format!("Updated {team}[{index}]"))
        }
        RosterAction::Remove {
            team,
            index,
            member_id,
            expect_version: expected,
        } => {
            let removed = match (index, member_id, expected) {
                (_, Some(id), _) => roster.remove_member(&team, &parse_id(&id)?).await?,
                (Some(index), None, Some(expected)) => {
                    let version = expect_version(roster, &team, &expected).await?;
                    roster.remove_checked(&team, index, &version).await?
                }
                (Some(index), None, None) => roster.remove(&team, index).await?,
                (None, None, _) => bail!("give a member INDEX or --member-id"),
            };
            let name = removed.get("name").and_then(Value::as_str).unwrap_or("member").to_string();
            done(
                format,
                Value::Object(removed),
                format!("Removed {} from {team}; later members shifted down", name.yellow()),
            )
        }
    }
}

async fn cmd_intents(trellis: &Trellis, action: Option<IntentAction>, format: OutputFormat) -> anyhow::Result<()> {
    match action.unwrap_or(IntentAction::List) {
        IntentAction::List => {
            let pending = trellis.pending_intents().await?;
            emit(format, json!(pending), || {
                if pending.is_empty() {
                    format!("{} No unfinished writes.", "✓".green().bold())
                } else {
                    pending.iter().map(render::intent_line).collect::<Vec<_>>().join("\n")
                }
            })
        }
        IntentAction::Replay { id } => {
            let intent = trellis.replay_intent(&parse_id(&id)?).await?;
            done(
                format,
                json!({"replayed": intent.id.as_str()}),
                format!("Replayed {} ({})", intent.id.to_string().yellow(), intent.kind),
            )
        }
        IntentAction::Discard { id } => {
            let id = parse_id(&id)?;
            trellis.discard_intent(&id).await?;
            done(format, json!({"discarded": id.as_str()}), format!("Discarded {}", id.to_string().yellow()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use trellis_assets::StubUploader;
    use trellis_store::InMemoryPathStore;
    use trellis_types::DocPath;

    #[test]
    fn assignments_keep_json_types() {
        assert_eq!(parse_assignment("rank=2").unwrap(), ("rank".into(), json!(2)));
        assert_eq!(parse_assignment("url=null").unwrap(), ("url".into(), Value::Null));
        assert_eq!(parse_assignment("name=Acme Corp").unwrap(), ("name".into(), json!("Acme Corp")));
        assert_eq!(parse_assignment("phone=0123").unwrap(), ("phone".into(), json!("0123")));
        assert_eq!(parse_assignment("note=a=b").unwrap(), ("note".into(), json!("a=b")));
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn malformed_id_exits_as_invalid_input() {
        let err = entity_key("gold".into(), "a/b").unwrap_err();
        assert!(matches!(err.downcast_ref::<RecordError>(), Some(RecordError::InvalidRecord(_))));
        assert_eq!(render::exit_code(&err), 2);
        assert_eq!(parse_id("acme").unwrap().as_str(), "acme");
    }

    #[test]
    fn set_overrides_json() {
        let args = FieldArgs {
            set: vec!["tier=gold".into()],
            json: Some(r#"{"name": "Acme", "tier": "silver"}"#.into()),
            asset: None,
        };
        let fields = collect_fields(&args).unwrap();
        assert_eq!(fields["name"], "Acme");
        assert_eq!(fields["tier"], "gold");
    }

    #[test]
    fn json_must_be_a_mapping() {
        let args = FieldArgs {
            json: Some("[1]".into()),
            ..Default::default()
        };
        assert!(collect_fields(&args).is_err());
    }

    #[tokio::test]
    async fn asset_file_is_attached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, b"png-bytes").unwrap();

        let change = build_change(&FieldArgs {
            asset: Some(path),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(change.asset.unwrap().len(), 9);

        let missing = build_change(&FieldArgs {
            asset: Some(PathBuf::from("/nonexistent/logo.png")),
            ..Default::default()
        })
        .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn stale_roster_version_is_refused() {
        let roster = RosterMutator::new(
            Arc::new(InMemoryPathStore::new()),
            DocPath::parse("teams").unwrap(),
            Arc::new(StubUploader::default()),
        );
        let fields = serde_json::from_value::<Record>(json!({"name": "A", "role": "dev"})).unwrap();
        roster.add("core", Change::new(fields)).await.unwrap();
        let listed = roster.snapshot("core").await.unwrap().version.to_hex();

        assert!(expect_version(&roster, "core", &listed[..12]).await.is_ok());
        assert!(expect_version(&roster, "core", "abc").await.is_err());
        roster.remove("core", 0).await.unwrap();
        assert!(expect_version(&roster, "core", &listed[..12]).await.is_err());
    }
}
