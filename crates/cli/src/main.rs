use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kdash_api::{
    CancellationToken, ConfigMapSummary, Dashboard, DataSelectParams, EventSummary, JobSummary, KubeLister, ListView,
    NamespaceQuery, NamespaceSummary, NodeSummary, PodDetail, PodList, SecretSummary, UpstreamError,
};
use serde::Serialize;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "kdashctl", version, about = "kdash CLI: dashboard list and detail views")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Namespaces to query, comma separated (default: all)
    #[arg(long = "ns", global = true, env = "KDASH_NAMESPACE")]
    namespace: Option<String>,

    /// Cancel the request after this many seconds
    #[arg(long = "timeout", global = true, env = "KDASH_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Log filter directives, e.g. "info,kdash_kubehub=debug"
    #[arg(long = "log", global = true, env = "KDASH_LOG", default_value = "info")]
    log: String,

    /// Serve Prometheus metrics on this host:port
    #[arg(long = "metrics-addr", global = true, env = "KDASH_METRICS_ADDR")]
    metrics_addr: Option<std::net::SocketAddr>,

    #[command(flatten)]
    select: SelectArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct SelectArgs {
    #[arg(long = "items-per-page", global = true)]
    items_per_page: Option<u32>,
    /// 1-based page number
    #[arg(long = "page", global = true)]
    page: Option<u32>,
    /// Direction/property pairs, e.g. "d,creationTimestamp,a,name"
    #[arg(long = "sort-by", global = true)]
    sort_by: Option<String>,
    /// Property/value pairs, e.g. "name,nginx"
    #[arg(long = "filter-by", global = true)]
    filter_by: Option<String>,
}

impl SelectArgs {
    fn params(&self) -> DataSelectParams {
        let per_page = self.items_per_page.or(self.page.map(|_| 10));
        DataSelectParams {
            items_per_page: per_page.map(|n| n.to_string()),
            page: per_page.map(|_| self.page.unwrap_or(1).to_string()),
            sort_by: self.sort_by.clone(),
            filter_by: self.filter_by.clone(),
            ..Default::default()
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List pods with status and warnings
    Pods,
    /// List nodes
    Nodes,
    /// List events
    Events,
    /// List config maps
    ConfigMaps,
    /// List secrets (names and types only)
    Secrets,
    /// List jobs
    Jobs,
    /// List namespaces
    Namespaces,
    /// Show one pod with its events and referenced config
    Pod {
        name: String,
    },
}

fn init_tracing(directives: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|e| {
        eprintln!("invalid --log filter {:?} ({}); using info", directives, e);
        tracing_subscriber::EnvFilter::new("info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics(addr: Option<std::net::SocketAddr>) {
    let Some(addr) = addr else { return };
    match metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!(%addr, "Prometheus metrics exporter listening"),
        Err(e) => warn!(error = %e, %addr, "failed to install metrics exporter"),
    }
}

/// Argument checks that need no cluster access.
fn check_scope(command: &Commands, nsq: &NamespaceQuery) -> Result<()> {
    if matches!(command, Commands::Pod { .. }) && nsq.to_request_param().is_none() {
        anyhow::bail!("pod detail needs exactly one namespace (--ns)");
    }
    Ok(())
}

/// Cancel `token` on Ctrl-C or once `timeout` elapses.
fn arm_cancellation(token: &CancellationToken, timeout: Duration) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = signal::ctrl_c() => info!("interrupted; cancelling request"),
            _ = tokio::time::sleep(timeout) => warn!(timeout_secs = timeout.as_secs(), "deadline reached; cancelling request"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    });
}

fn print_warnings(errors: &[UpstreamError]) {
    for e in errors {
        eprintln!("warning: {} ({})", e, e.kind.as_str());
    }
}

fn print_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn ns_or_dash(ns: &Option<String>) -> &str {
    ns.as_deref().unwrap_or("-")
}

fn print_list<T: Serialize>(
    out: &mut impl Write,
    output: Output,
    view: &ListView<T>,
    row: impl Fn(&T) -> String,
) -> Result<()> {
    match output {
        Output::Json => print_json(out, view)?,
        Output::Human => {
            for item in &view.items {
                writeln!(out, "{}", row(item))?;
            }
            writeln!(out, "({} of {} shown)", view.items.len(), view.list_meta.total_items)?;
            for m in &view.cumulative_metrics {
                let last = m.data_points.last().map(|p| p.y).unwrap_or(0);
                writeln!(out, "metric {} [{}]: latest {}", m.metric_name, m.aggregation.map(|a| a.as_str()).unwrap_or("raw"), last)?;
            }
        }
    }
    print_warnings(&view.errors);
    Ok(())
}

fn print_pods(out: &mut impl Write, output: Output, list: &PodList) -> Result<()> {
    match output {
        Output::Json => print_json(out, list)?,
        Output::Human => {
            for p in &list.pods {
                writeln!(
                    out,
                    "{} • {} • {} • restarts {} • {}",
                    ns_or_dash(&p.object_meta.namespace),
                    p.object_meta.name,
                    p.status.as_str(),
                    p.restart_count,
                    p.node_name.as_deref().unwrap_or("-"),
                )?;
                for w in &p.warnings {
                    writeln!(out, "    ! {}: {}", w.reason, w.message)?;
                }
            }
            let s = &list.status;
            writeln!(
                out,
                "({} of {} shown) running {} • pending {} • failed {} • succeeded {} • terminating {} • unknown {}",
                list.pods.len(),
                list.list_meta.total_items,
                s.running,
                s.pending,
                s.failed,
                s.succeeded,
                s.terminating,
                s.unknown,
            )?;
        }
    }
    print_warnings(&list.errors);
    Ok(())
}

fn print_pod_detail(out: &mut impl Write, output: Output, d: &PodDetail) -> Result<()> {
    match output {
        Output::Json => print_json(out, d)?,
        Output::Human => {
            let meta = &d.summary.object_meta;
            writeln!(
                out,
                "{}/{} • {} • ip {}",
                ns_or_dash(&meta.namespace),
                meta.name,
                d.summary.status.as_str(),
                d.pod_ip.as_deref().unwrap_or("-")
            )?;
            for c in &d.containers {
                writeln!(out, "  container {} • {} • ready {} • restarts {}", c.name, c.image, c.ready, c.restart_count)?;
            }
            for c in &d.config_maps {
                writeln!(out, "  configmap {} ({} keys)", c.object_meta.name, c.keys)?;
            }
            for s in &d.secrets {
                writeln!(out, "  secret {} ({})", s.object_meta.name, s.type_)?;
            }
            for e in &d.events.items {
                writeln!(out, "  event {} • {} • {} (x{})", e.type_, e.reason, e.message, e.count)?;
            }
        }
    }
    print_warnings(&d.errors);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);
    init_metrics(cli.metrics_addr);

    let nsq = cli.namespace.as_deref().map(NamespaceQuery::parse_csv).unwrap_or_else(NamespaceQuery::all);
    check_scope(&cli.command, &nsq)?;
    let query = cli.select.params().to_query();
    let lister = KubeLister::try_default().await.context("building kube client")?;
    let dash = Dashboard::new(lister);
    let cancel = CancellationToken::new();
    arm_cancellation(&cancel, Duration::from_secs(cli.timeout_secs));

    let t0 = Instant::now();
    info!(command = ?cli.command, ns = ?nsq.namespaces(), "kdashctl invoked");
    let res: Result<()> = async {
        match &cli.command {
            Commands::Pods => {
                let list = dash.pod_list(&nsq, &query, &cancel).await?;
                print_pods(&mut io::stdout().lock(), cli.output, &list)
            }
            Commands::Nodes => {
                let view = dash.node_list(&query, &cancel).await?;
                print_list(&mut io::stdout().lock(), cli.output, &view, |n: &NodeSummary| {
                    format!("{} • ready {}{}", n.object_meta.name, n.ready, if n.unschedulable { " • cordoned" } else { "" })
                })
            }
            Commands::Events => {
                let view = dash.event_list(&nsq, &query, &cancel).await?;
                print_list(&mut io::stdout().lock(), cli.output, &view, |e: &EventSummary| {
                    format!("{} • {} • {} • {}/{} • {}", ns_or_dash(&e.object_meta.namespace), e.type_, e.reason, e.object_kind, e.object_name, e.message)
                })
            }
            Commands::ConfigMaps => {
                let view = dash.config_map_list(&nsq, &query, &cancel).await?;
                print_list(&mut io::stdout().lock(), cli.output, &view, |c: &ConfigMapSummary| {
                    format!("{} • {} • {} keys", ns_or_dash(&c.object_meta.namespace), c.object_meta.name, c.keys)
                })
            }
            Commands::Secrets => {
                let view = dash.secret_list(&nsq, &query, &cancel).await?;
                print_list(&mut io::stdout().lock(), cli.output, &view, |s: &SecretSummary| {
                    format!("{} • {} • {}", ns_or_dash(&s.object_meta.namespace), s.object_meta.name, s.type_)
                })
            }
            Commands::Jobs => {
                let view = dash.job_list(&nsq, &query, &cancel).await?;
                print_list(&mut io::stdout().lock(), cli.output, &view, |j: &JobSummary| {
                    let completions = j.completions.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
                    format!("{} • {} • {} • {}/{}", ns_or_dash(&j.object_meta.namespace), j.object_meta.name, j.status, j.succeeded, completions)
                })
            }
            Commands::Namespaces => {
                let view = dash.namespace_list(&query, &cancel).await?;
                print_list(&mut io::stdout().lock(), cli.output, &view, |n: &NamespaceSummary| format!("{} • {}", n.object_meta.name, n.phase))
            }
            Commands::Pod { name } => {
                let ns = nsq.to_request_param().unwrap_or_default();
                let detail = dash.pod_detail(ns, name, &cancel).await?;
                print_pod_detail(&mut io::stdout().lock(), cli.output, &detail)
            }
        }
    }
    .await;
    cancel.cancel();

    match res {
        Ok(()) => {
            info!(took_ms = %t0.elapsed().as_millis(), "kdashctl done");
            Ok(())
        }
        Err(e) => match e.downcast_ref::<UpstreamError>() {
            Some(up) => {
                error!(error = %up, kind = up.kind.as_str(), "request failed");
                eprintln!("error {}: {}", up.http_status(), up.plain_text());
                std::process::exit(1);
            }
            None => {
                error!(error = %e, "output failed");
                Err(e)
            }
        },
    }
}
