//! Rendering of snapshots and notifications.

use std::io::{self, Write};

use console::{Term, style};
use repopulse::analytics::{CommitEntry, ContributorEntry, HealthMetrics, LanguageEntry};
use repopulse::{AnalyticsSnapshot, Notification, NotificationCenter, NotificationLevel};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// JSON output
    Json,
}

#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Debug, Clone, Tabled)]
struct LanguageRow {
    #[tabled(rename = "Language")]
    name: String,
    #[tabled(rename = "Share")]
    share: String,
    #[tabled(rename = "Bytes")]
    bytes: u64,
    #[tabled(rename = "Color")]
    color: String,
}

impl From<&LanguageEntry> for LanguageRow {
    fn from(entry: &LanguageEntry) -> Self {
        Self {
            name: entry.name.clone(),
            share: format!("{:.1}%", entry.percentage),
            bytes: entry.bytes,
            color: entry.color.clone(),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct ContributorRow {
    #[tabled(rename = "Login")]
    login: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Commits")]
    commits: u64,
    #[tabled(rename = "Share")]
    share: String,
    #[tabled(rename = "+/-")]
    churn: String,
    #[tabled(rename = "Followers")]
    followers: u64,
}

impl From<&ContributorEntry> for ContributorRow {
    fn from(entry: &ContributorEntry) -> Self {
        Self {
            login: entry.login.clone(),
            name: entry.display_name.clone(),
            commits: entry.commits,
            share: format!("{}%", entry.percentage),
            churn: format!("+{} / -{}", entry.additions, entry.deletions),
            followers: entry.profile.followers,
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct CommitRow {
    #[tabled(rename = "SHA")]
    sha: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&CommitEntry> for CommitRow {
    fn from(entry: &CommitEntry) -> Self {
        Self {
            sha: entry.sha.chars().take(7).collect(),
            author: entry.author.clone(),
            date: entry
                .timestamp
                .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
            message: truncate(&entry.message, 60),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct ActivityRow {
    #[tabled(rename = "Period")]
    label: String,
    #[tabled(rename = "Commits")]
    commits: u64,
    #[tabled(rename = "")]
    bar: String,
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn summary_rows(snapshot: &AnalyticsSnapshot) -> Vec<SummaryRow> {
    let meta = &snapshot.metadata;
    let stats = &snapshot.stats;
    let mut rows = vec![
        SummaryRow {
            metric: "Repository",
            value: meta.full_name.clone(),
        },
        SummaryRow {
            metric: "Description",
            value: meta.description.clone().unwrap_or_default(),
        },
        SummaryRow {
            metric: "Stars",
            value: stats.stars.to_string(),
        },
        SummaryRow {
            metric: "Forks",
            value: stats.forks.to_string(),
        },
        SummaryRow {
            metric: "Watchers",
            value: stats.watchers.to_string(),
        },
        SummaryRow {
            metric: "Open issues",
            value: stats.open_issues.to_string(),
        },
        SummaryRow {
            metric: "Pull requests",
            value: stats.pull_requests.to_string(),
        },
        SummaryRow {
            metric: "Contributors",
            value: stats.contributors.to_string(),
        },
        SummaryRow {
            metric: "Total commits",
            value: stats.total_commits.to_string(),
        },
        SummaryRow {
            metric: "Lines of code (est.)",
            value: stats.lines_of_code.to_string(),
        },
        SummaryRow {
            metric: "Updated",
            value: meta.updated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        },
    ];
    if let Some(license) = &meta.license {
        rows.push(SummaryRow {
            metric: "License",
            value: license.clone(),
        });
    }
    rows
}

fn health_rows(health: &HealthMetrics) -> Vec<SummaryRow> {
    [
        ("Activity", health.activity),
        ("Community", health.community),
        ("Maintenance", health.maintenance),
        ("Documentation", health.documentation),
        ("Code quality", health.code_quality),
        ("Growth", health.growth),
    ]
    .into_iter()
    .map(|(metric, score)| SummaryRow {
        metric,
        value: format!("{score:>3} {}", "█".repeat((score / 10) as usize)),
    })
    .collect()
}

fn activity_rows(snapshot: &AnalyticsSnapshot) -> Vec<ActivityRow> {
    let max = snapshot
        .activity
        .points
        .iter()
        .map(|p| p.commits)
        .max()
        .unwrap_or(0)
        .max(1);
    snapshot
        .activity
        .points
        .iter()
        .map(|p| ActivityRow {
            label: p.label.clone(),
            commits: p.commits,
            bar: "▇".repeat(((p.commits * 20) / max) as usize),
        })
        .collect()
}

fn table<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

/// Render a snapshot as text in the requested format.
pub(crate) fn render_snapshot(
    snapshot: &AnalyticsSnapshot,
    format: OutputFormat,
) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(snapshot),
        OutputFormat::Table => {
            let mut out = String::new();
            out.push_str(&table(summary_rows(snapshot)));

            if !snapshot.languages.is_empty() {
                out.push_str("\n\nLanguages\n");
                out.push_str(&table(snapshot.languages.iter().map(LanguageRow::from)));
            }
            if !snapshot.contributors.is_empty() {
                out.push_str("\n\nTop contributors\n");
                out.push_str(&table(
                    snapshot.contributors.iter().map(ContributorRow::from),
                ));
            }
            if !snapshot.commits.is_empty() {
                out.push_str("\n\nRecent commits\n");
                out.push_str(&table(snapshot.commits.iter().map(CommitRow::from)));
            }

            out.push_str(if snapshot.activity.is_synthetic() {
                "\n\nActivity (placeholder, statistics not yet computed)\n"
            } else {
                "\n\nWeekly activity\n"
            });
            out.push_str(&table(activity_rows(snapshot)));

            out.push_str("\n\nHealth\n");
            out.push_str(&table(health_rows(&snapshot.health)));
            out.push('\n');
            Ok(out)
        }
    }
}

/// Write a rendered snapshot to stdout.
pub(crate) fn print_snapshot(snapshot: &AnalyticsSnapshot, format: OutputFormat) -> io::Result<()> {
    let rendered = render_snapshot(snapshot, format).map_err(io::Error::other)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    stdout.flush()
}

fn format_notification(notification: &Notification, colored: bool) -> String {
    let label = match notification.level {
        NotificationLevel::Error => "error",
        NotificationLevel::Info => "info",
    };
    if !colored {
        return format!("{label}: {}", notification.message);
    }
    let label = match notification.level {
        NotificationLevel::Error => style(label).red().bold(),
        NotificationLevel::Info => style(label).cyan().bold(),
    };
    format!("{label}: {}", notification.message)
}

/// Print every notification to stderr as it is raised.
///
/// In non-interactive mode notifications go through tracing instead.
pub(crate) fn install_notification_printer(notifications: &NotificationCenter) {
    let is_tty = Term::stderr().is_term();
    notifications.on_notify(Box::new(move |notification| {
        if is_tty {
            eprintln!("{}", format_notification(notification, true));
        } else {
            match notification.level {
                NotificationLevel::Error => tracing::error!("{}", notification.message),
                NotificationLevel::Info => tracing::info!("{}", notification.message),
            }
        }
    }));
}
