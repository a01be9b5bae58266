use anyhow::Context;
use std::io::{self, Write};
use std::path::PathBuf;
use time::Date;
use time::macros::format_description;
use tracing_subscriber::EnvFilter;
use tune_history::bucket::Granularity;
use tune_history::config::{self, Settings};
use tune_history::engine::{StatsEngine, TimePeriod};
use tune_history::export::{self, ExportFormat};
use tune_history::filter::{self, Column, RowFilter, RowSort, SortDirection};
use tune_history::history::{self, LoadReport};
use tune_history::model::{AggregateRow, BucketRow, DateRange, GroupMode};
use tune_history::timezone::ZoneResolver;

#[derive(Debug, Default)]
struct CliArgs {
    paths: Vec<PathBuf>,
    since: Option<Date>,
    to: Option<Date>,
    period: Option<TimePeriod>,
    group: Option<GroupMode>,
    buckets: Option<Granularity>,
    filter: RowFilter,
    sort: RowSort,
    page: usize,
    drill: Option<usize>,
    format: Option<ExportFormat>,
    write_config: bool,
}

fn main() -> anyhow::Result<()> {
    setup_logging();
    let args = parse_args(std::env::args().skip(1).collect())?;
    let settings = config::load_settings()?;

    if args.write_config {
        let path = config::save_settings(&settings)?;
        println!("wrote {}", path.display());
        if args.paths.is_empty() {
            return Ok(());
        }
    }
    if args.paths.is_empty() {
        print_help();
        anyhow::bail!("no export files or folders given");
    }

    let mut resolver = ZoneResolver::with_overrides(&settings.timezone_overrides);
    let report = history::load_paths(&args.paths, &mut resolver);
    print_load_problems(&report);
    if report.history.is_empty() {
        anyhow::bail!("no listening events found in the given exports");
    }

    let mut engine = StatsEngine::new(report.history, &settings);
    let range = select_range(&mut engine, &args)?;
    let mode = args.group.unwrap_or(settings.default_group_mode);
    let granularity = args.buckets.unwrap_or(settings.default_granularity);
    let rows = engine.aggregate_rows(mode, range, &args.filter, args.sort);

    let drilled = match args.drill {
        Some(rank) => Some(
            engine
                .aggregate_rows(mode, range, &RowFilter::default(), RowSort::default())
                .into_iter()
                .find(|row| row.rank == rank)
                .with_context(|| format!("no row with rank {rank} in this range"))?,
        ),
        None => None,
    };
    let buckets = engine.bucket_rows(granularity, range, drilled.as_ref().map(|row| (mode, row)));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Some(format) = args.format {
        if drilled.is_some() {
            export::write_buckets(&mut out, &buckets, format)?;
        } else {
            export::write_rows(&mut out, &rows, mode, format)?;
        }
        return Ok(());
    }

    let summary = engine.summary(range);
    writeln!(
        out,
        "{} plays, {} minutes ({})",
        summary.total_play_count,
        summary.total_minutes,
        summary.duration_text()
    )?;
    writeln!(
        out,
        "{} different tracks and {} different artists",
        summary.distinct_tracks, summary.distinct_artists
    )?;
    writeln!(
        out,
        "top 10% of artists: {}% of plays, top 10% of tracks: {}% of plays",
        summary.top_artists_share_percent, summary.top_tracks_share_percent
    )?;
    let artist_variety = engine.variety_score(GroupMode::Artists).unwrap_or_default();
    let track_variety = engine.variety_score(GroupMode::Tracks).unwrap_or_default();
    writeln!(
        out,
        "variety score: artists {artist_variety}, tracks {track_variety}"
    )?;
    let units = summary.equivalents;
    writeln!(
        out,
        "that is {} plays of Abbey Road or {} Lord of the Rings marathons",
        units.abbey_road_plays, units.lotr_trilogy_viewings
    )?;

    writeln!(out)?;
    match &drilled {
        Some(row) => writeln!(out, "{} for {}", granularity.label(), row.primary_key)?,
        None => writeln!(out, "{}", granularity.label())?,
    }
    print_buckets(&mut out, granularity, &buckets)?;

    writeln!(out)?;
    let pages = filter::page_count(rows.len(), settings.page_size);
    let page = args.page.min(pages - 1);
    writeln!(
        out,
        "{} (page {} of {pages}, {} rows)",
        mode.label(),
        page + 1,
        rows.len()
    )?;
    print_rows(&mut out, mode, filter::paginate(&rows, page, settings.page_size))?;
    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn select_range(engine: &mut StatsEngine, args: &CliArgs) -> anyhow::Result<DateRange> {
    let bounds = engine
        .data_bounds()
        .context("no listening events loaded")?;
    let period = if args.since.is_some() || args.to.is_some() {
        TimePeriod::Custom {
            from: args.since.unwrap_or(bounds.since.date()),
            to: args.to.unwrap_or(bounds.to.date()),
        }
    } else {
        args.period.unwrap_or(TimePeriod::All)
    };
    let ticket = engine
        .request_period(period)
        .context("no listening events loaded")?;
    DateRange::checked(ticket.range.since, ticket.range.to)?;
    engine.apply(ticket);
    Ok(ticket.range)
}

fn print_load_problems(report: &LoadReport) {
    for path in &report.ignored_files {
        eprintln!("ignored {} (not a StreamingHistory export)", path.display());
    }
    for err in &report.file_errors {
        eprintln!("error: {err}");
    }
    if report.skipped_records() > 0 {
        eprintln!("skipped {} malformed records", report.skipped_records());
    }
    for warning in &report.timezone_warnings {
        eprintln!("warning: {warning}");
    }
}

fn print_buckets(
    out: &mut impl Write,
    granularity: Granularity,
    rows: &[BucketRow],
) -> io::Result<()> {
    for row in rows {
        writeln!(
            out,
            "{:>10}  {:>7} min  {:>6} plays  {} / {}",
            granularity.format_key(row.bucket_key),
            row.total_minutes,
            row.play_count,
            row.top_track,
            row.top_artist
        )?;
    }
    Ok(())
}

fn print_rows(out: &mut impl Write, mode: GroupMode, rows: &[AggregateRow]) -> io::Result<()> {
    let visible = filter::columns(mode);
    let header: Vec<&str> = visible.iter().map(|column| column.header()).collect();
    writeln!(out, "{}", header.join(" | "))?;
    for row in rows {
        let cells: Vec<String> = visible.iter().map(|column| column.cell(row)).collect();
        writeln!(out, "{}", cells.join(" | "))?;
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        match flag {
            "--since" => out.since = Some(parse_date(next_value(&args, &mut index, flag)?)?),
            "--to" => out.to = Some(parse_date(next_value(&args, &mut index, flag)?)?),
            "--period" => {
                out.period = Some(match next_value(&args, &mut index, flag)? {
                    "all" => TimePeriod::All,
                    "year" => TimePeriod::Last12Months,
                    "month" => TimePeriod::LastMonth,
                    other => anyhow::bail!("unknown period {other}, expected all|year|month"),
                })
            }
            "--group" => {
                out.group = Some(match next_value(&args, &mut index, flag)? {
                    "tracks" => GroupMode::Tracks,
                    "artists" => GroupMode::Artists,
                    other => anyhow::bail!("unknown group {other}, expected tracks|artists"),
                })
            }
            "--buckets" => {
                let value = next_value(&args, &mut index, flag)?;
                out.buckets = Some(
                    Granularity::parse(value)
                        .with_context(|| format!("unknown bucket granularity {value}"))?,
                );
            }
            "--search" => out.filter.search = next_value(&args, &mut index, flag)?.to_string(),
            "--min-plays" => out.filter.plays.min = Some(parse_number(&args, &mut index, flag)?),
            "--max-plays" => out.filter.plays.max = Some(parse_number(&args, &mut index, flag)?),
            "--min-minutes" => {
                out.filter.minutes.min = Some(parse_number(&args, &mut index, flag)?)
            }
            "--max-minutes" => {
                out.filter.minutes.max = Some(parse_number(&args, &mut index, flag)?)
            }
            "--sort" => {
                let value = next_value(&args, &mut index, flag)?;
                out.sort.column =
                    Some(Column::parse(value).with_context(|| format!("unknown column {value}"))?);
            }
            "--asc" => out.sort.direction = SortDirection::Ascending,
            "--page" => {
                let page: u64 = parse_number(&args, &mut index, flag)?;
                out.page = usize::try_from(page.saturating_sub(1)).unwrap_or(usize::MAX);
            }
            "--drill" => {
                let rank: u64 = parse_number(&args, &mut index, flag)?;
                out.drill = Some(usize::try_from(rank).context("--drill rank is too large")?);
            }
            "--format" => {
                let value = next_value(&args, &mut index, flag)?;
                out.format = match value {
                    "table" => None,
                    other => Some(
                        ExportFormat::parse(other)
                            .with_context(|| format!("unknown format {other}"))?,
                    ),
                };
            }
            "--write-config" => out.write_config = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with("--") => anyhow::bail!("unknown argument {other}"),
            path => out.paths.push(PathBuf::from(path)),
        }
        index += 1;
    }
    Ok(out)
}

fn next_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> anyhow::Result<&'a str> {
    *index += 1;
    let Some(value) = args.get(*index) else {
        anyhow::bail!("{flag} requires a value");
    };
    if value.trim().is_empty() {
        anyhow::bail!("{flag} cannot be empty");
    }
    Ok(value.trim())
}

fn parse_number(args: &[String], index: &mut usize, flag: &str) -> anyhow::Result<u64> {
    let value = next_value(args, index, flag)?;
    value
        .parse()
        .with_context(|| format!("{flag} expects a whole number, got {value}"))
}

fn parse_date(value: &str) -> anyhow::Result<Date> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("expected a YYYY-MM-DD date, got {value}"))
}

fn print_help() {
    println!("tune-history [OPTIONS] <PATH>...");
    println!("  PATH                    StreamingHistory*.json / Streaming_History_Audio*.json files or folders");
    println!("  --since/--to YYYY-MM-DD Custom date range, both days inclusive");
    println!("  --period all|year|month Preset range ending at the last play");
    println!("  --group tracks|artists  Ranking dimension");
    println!("  --buckets NAME          hours|weekend|weekdays|weeks|months|quarters|years");
    println!("  --search TEXT           Artist (and track) substring filter");
    println!("  --min-plays/--max-plays N");
    println!("  --min-minutes/--max-minutes N");
    println!("  --sort COLUMN           rank|artist|track|plays|minutes");
    println!("  --asc                   Ascending sort (default descending)");
    println!("  --page N                Page of the ranking table, from 1");
    println!("  --drill RANK            Bucket chart for a single ranked row");
    println!("  --format table|csv|json Output format");
    println!("  --write-config          Write current settings to the config file");
}
