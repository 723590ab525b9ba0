//! `crm-cli`: operator CLI over the CRM dashboard store.
//!
//! Every invocation builds a fresh store against the configured backend,
//! loads what the command needs and prints JSON on stdout (CSV for
//! exports). Logs go to stderr.

mod parse;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use crm::ai::{AiError, AiRequest};
use crm::config::ConfigError;
use crm::export::{self, ExportError};
use crm::models::{
    CampaignDraft, CommunicationLog, CustomerDraft, DeliveryReceipt, LogStatus, OrderDraft, OrderItem, OrderStatus,
    SegmentRule,
};
use crm::query::{
    ActivityFilter, CustomerQuery, CustomerSortField, DEFAULT_PER_PAGE, DashboardStats, DateWindow, DeliveryStats,
    LogQuery, LogSortField, OrderQuery, OrderSortField, Page, Pager, Sort, SortDirection,
};
use crm::validate::{self, ValidationErrors};
use crm::{ApiConfig, ApiError, HttpApi, StoreError};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

type Store = crm::Store<HttpApi>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("validation failed: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "crm-cli", about = "CRM dashboard store CLI")]
struct Cli {
    /// Full API base URL, e.g. http://127.0.0.1:5000/api
    #[arg(long, global = true, env = "CRM_API_URL")]
    api_url: Option<String>,

    /// More log output on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every collection and print their sizes.
    Fetch,
    Customers(CustomersCommand),
    Orders(OrdersCommand),
    Campaigns(CampaignsCommand),
    Logs(LogsCommand),
    /// Run an AI generator (message, segment, summary, variants,
    /// performance, optimal-time, lookalike, tags).
    Ai {
        kind: String,
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Dashboard totals plus delivery stats over all logs.
    Stats,
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    per_page: usize,
}

impl PageArgs {
    fn pager(&self) -> Pager {
        Pager::new(self.page, self.per_page)
    }
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Write to the dashboard's default filename instead of stdout.
    #[arg(long)]
    save: bool,
}

// ---- customers ----

#[derive(Args, Debug)]
struct CustomersCommand {
    #[command(subcommand)]
    command: CustomersSubcommand,
}

#[derive(Subcommand, Debug)]
enum CustomersSubcommand {
    List {
        #[command(flatten)]
        filter: CustomerFilter,
        #[command(flatten)]
        page: PageArgs,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        total_spend: f64,
        #[arg(long, default_value_t = 0)]
        visit_count: u32,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        total_spend: Option<f64>,
        #[arg(long)]
        visit_count: Option<u32>,
    },
    Delete {
        id: String,
    },
    Export {
        #[command(flatten)]
        filter: CustomerFilter,
        #[command(flatten)]
        export: ExportArgs,
    },
}

#[derive(Args, Debug)]
struct CustomerFilter {
    #[arg(long, default_value = "")]
    search: String,
    /// all, active or inactive
    #[arg(long, default_value = "all")]
    activity: ActivityFilter,
    /// all, today, week or month (by last visit)
    #[arg(long, default_value = "all")]
    window: DateWindow,
    /// name, email, spend or visit
    #[arg(long, default_value = "name")]
    sort: CustomerSortField,
    #[arg(long, value_parser = parse::direction, default_value = "asc")]
    direction: SortDirection,
}

impl CustomerFilter {
    fn query(&self) -> CustomerQuery {
        CustomerQuery {
            search: self.search.clone(),
            activity: self.activity,
            window: self.window,
            sort: Sort::new(self.sort, self.direction),
        }
    }
}

// ---- orders ----

#[derive(Args, Debug)]
struct OrdersCommand {
    #[command(subcommand)]
    command: OrdersSubcommand,
}

#[derive(Subcommand, Debug)]
enum OrdersSubcommand {
    List {
        #[command(flatten)]
        filter: OrderFilter,
        #[command(flatten)]
        page: PageArgs,
    },
    Add {
        #[arg(long)]
        customer: String,
        /// name:price:qty, repeatable
        #[arg(long = "item", value_parser = parse::order_item, required = true)]
        items: Vec<OrderItem>,
        #[arg(long, default_value = "pending")]
        status: OrderStatus,
    },
    Update {
        id: String,
        #[arg(long)]
        status: Option<OrderStatus>,
        /// Replaces every item when given.
        #[arg(long = "item", value_parser = parse::order_item)]
        items: Vec<OrderItem>,
    },
    Delete {
        id: String,
    },
    Export {
        #[command(flatten)]
        filter: OrderFilter,
        #[command(flatten)]
        export: ExportArgs,
    },
}

#[derive(Args, Debug)]
struct OrderFilter {
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long)]
    status: Option<OrderStatus>,
    #[arg(long, default_value = "all")]
    window: DateWindow,
    /// id, date, amount or status
    #[arg(long, default_value = "date")]
    sort: OrderSortField,
    #[arg(long, value_parser = parse::direction, default_value = "desc")]
    direction: SortDirection,
}

impl OrderFilter {
    fn query(&self) -> OrderQuery {
        OrderQuery {
            search: self.search.clone(),
            status: self.status,
            window: self.window,
            sort: Sort::new(self.sort, self.direction),
        }
    }
}

// ---- campaigns ----

#[derive(Args, Debug)]
struct CampaignsCommand {
    #[command(subcommand)]
    command: CampaignsSubcommand,
}

#[derive(Subcommand, Debug)]
enum CampaignsSubcommand {
    List,
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        message_template: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        objective: Option<String>,
        /// field:operator:value[:AND|OR], repeatable
        #[arg(long = "rule", value_parser = parse::segment_rule)]
        rules: Vec<SegmentRule>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Estimate the audience for a rule set without saving anything.
    Preview {
        #[arg(long = "rule", value_parser = parse::segment_rule, required = true)]
        rules: Vec<SegmentRule>,
    },
    /// Delivery logs of one campaign, with delivery stats.
    Logs {
        id: String,
    },
    /// Record a delivery receipt for one communication log.
    Receipt {
        #[arg(long)]
        log: String,
        #[arg(long)]
        status: LogStatus,
        #[arg(long)]
        error: Option<String>,
    },
}

// ---- logs ----

#[derive(Args, Debug)]
struct LogsCommand {
    #[command(subcommand)]
    command: LogsSubcommand,
}

#[derive(Subcommand, Debug)]
enum LogsSubcommand {
    List {
        /// Only this customer's logs, fetched from the server.
        #[arg(long, conflicts_with = "status")]
        customer: Option<String>,
        /// Only logs in this status, fetched from the server.
        #[arg(long)]
        status: Option<LogStatus>,
        #[command(flatten)]
        filter: LogFilter,
        #[command(flatten)]
        page: PageArgs,
    },
    Export {
        /// Export one campaign's logs instead of all of them.
        #[arg(long)]
        campaign: Option<String>,
        #[command(flatten)]
        filter: LogFilter,
        #[command(flatten)]
        export: ExportArgs,
    },
}

#[derive(Args, Debug)]
struct LogFilter {
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long, default_value = "all")]
    window: DateWindow,
    /// sent or status
    #[arg(long, default_value = "sent")]
    sort: LogSortField,
    #[arg(long, value_parser = parse::direction, default_value = "desc")]
    direction: SortDirection,
}

impl LogFilter {
    fn query(&self) -> LogQuery {
        LogQuery {
            search: self.search.clone(),
            status: None,
            window: self.window,
            sort: Sort::new(self.sort, self.direction),
        }
    }
}

// =============================================================================
// OUTPUT SHAPES
// =============================================================================

#[derive(Serialize)]
struct FetchSummary {
    customers: usize,
    orders: usize,
    campaigns: usize,
    logs: usize,
}

#[derive(Serialize)]
struct StatsReport {
    dashboard: DashboardStats,
    delivery: DeliveryStats,
}

#[derive(Serialize)]
struct CampaignLogs {
    stats: DeliveryStats,
    logs: Vec<CommunicationLog>,
}

#[derive(Serialize)]
struct Deleted<'a> {
    deleted: &'a str,
}

// =============================================================================
// ENTRY
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, "failed to load .env");
        }
    }

    let store = Store::connect(&api_config(cli.api_url.as_deref())?)?;
    debug!(command = ?cli.command, "running");

    match cli.command {
        Command::Fetch => run_fetch(&store).await,
        Command::Customers(cmd) => run_customers(&store, cmd.command).await,
        Command::Orders(cmd) => run_orders(&store, cmd.command).await,
        Command::Campaigns(cmd) => run_campaigns(&store, cmd.command).await,
        Command::Logs(cmd) => run_logs(&store, cmd.command).await,
        Command::Ai { kind, data } => run_ai(&store, &kind, &data).await,
        Command::Stats => run_stats(&store).await,
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn api_config(api_url: Option<&str>) -> Result<ApiConfig, CliError> {
    let mut config = ApiConfig::from_env()?;
    if let Some(url) = api_url {
        config.set_base_url("--api-url", url)?;
    }
    Ok(config)
}

// =============================================================================
// COMMANDS
// =============================================================================

async fn run_fetch(store: &Store) -> Result<(), CliError> {
    store.fetch_all().await?;
    let snapshot = store.snapshot().await;
    print_json(&FetchSummary {
        customers: snapshot.customers.len(),
        orders: snapshot.orders.len(),
        campaigns: snapshot.campaigns.len(),
        logs: snapshot.logs.len(),
    })
}

async fn run_customers(store: &Store, command: CustomersSubcommand) -> Result<(), CliError> {
    let now = OffsetDateTime::now_utc();
    match command {
        CustomersSubcommand::List { filter, page } => {
            store.fetch_all().await?;
            let customers = filter.query().apply(&store.customers().await, now);
            print_json(&Page::of(&customers, page.pager()))
        }
        CustomersSubcommand::Add { name, email, phone, total_spend, visit_count } => {
            let draft = CustomerDraft { phone, total_spend, visit_count, ..CustomerDraft::new(name, email) };
            validate::customer(&draft)?;
            print_json(&store.create_customer(draft).await?)
        }
        CustomersSubcommand::Update { id, name, email, phone, total_spend, visit_count } => {
            let mut draft = CustomerDraft::from(&store.customer(&id).await?);
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(email) = email {
                draft.email = email;
            }
            if phone.is_some() {
                draft.phone = phone;
            }
            if let Some(total_spend) = total_spend {
                draft.total_spend = total_spend;
            }
            if let Some(visit_count) = visit_count {
                draft.visit_count = visit_count;
            }
            validate::customer(&draft)?;
            print_json(&store.update_customer(&id, draft).await?)
        }
        CustomersSubcommand::Delete { id } => {
            store.delete_customer(&id).await?;
            print_json(&Deleted { deleted: &id })
        }
        CustomersSubcommand::Export { filter, export } => {
            store.fetch_all().await?;
            let customers = filter.query().apply(&store.customers().await, now);
            let csv = export::customers_csv(&customers, now)?;
            emit_csv(&csv, export::customers_filename(now), export.save)
        }
    }
}

async fn run_orders(store: &Store, command: OrdersSubcommand) -> Result<(), CliError> {
    let now = OffsetDateTime::now_utc();
    match command {
        OrdersSubcommand::List { filter, page } => {
            store.fetch_all().await?;
            let orders = filter
                .query()
                .apply(&store.orders().await, &store.customers().await, now);
            print_json(&Page::of(&orders, page.pager()))
        }
        OrdersSubcommand::Add { customer, items, status } => {
            let mut draft = items
                .into_iter()
                .fold(OrderDraft::new(customer), OrderDraft::with_item);
            draft.status = status;
            draft.order_date = Some(now);
            validate::order(&draft)?;
            print_json(&store.create_order(draft).await?)
        }
        OrdersSubcommand::Update { id, status, items } => {
            let current = store.order(&id).await?;
            let mut draft = if items.is_empty() {
                OrderDraft::from_order(&current)
            } else {
                let mut draft = items
                    .into_iter()
                    .fold(OrderDraft::new(current.customer_id().unwrap_or_default()), OrderDraft::with_item);
                draft.status = current.status;
                draft.order_date = current.order_date;
                draft
            };
            if let Some(status) = status {
                draft.status = status;
            }
            validate::order(&draft)?;
            print_json(&store.update_order(&id, draft).await?)
        }
        OrdersSubcommand::Delete { id } => {
            store.delete_order(&id).await?;
            print_json(&Deleted { deleted: &id })
        }
        OrdersSubcommand::Export { filter, export } => {
            store.fetch_all().await?;
            let customers = store.customers().await;
            let orders = filter.query().apply(&store.orders().await, &customers, now);
            let csv = export::orders_csv(&orders, &customers)?;
            emit_csv(&csv, export::orders_filename(now), export.save)
        }
    }
}

async fn run_campaigns(store: &Store, command: CampaignsSubcommand) -> Result<(), CliError> {
    match command {
        CampaignsSubcommand::List => {
            store.fetch_all().await?;
            print_json(&store.campaigns().await)
        }
        CampaignsSubcommand::Show { id } => print_json(&store.campaign(&id).await?),
        CampaignsSubcommand::Create { name, message_template, description, objective, rules, tags } => {
            let draft = CampaignDraft {
                name,
                description,
                objective,
                message_template,
                segment_rules: rules,
                tags,
                ..CampaignDraft::default()
            };
            validate::campaign(&draft)?;
            print_json(&store.create_campaign(draft).await?)
        }
        CampaignsSubcommand::Preview { rules } => print_json(&store.preview_audience(&rules).await?),
        CampaignsSubcommand::Logs { id } => {
            let logs = store.campaign_logs(&id).await?;
            print_json(&CampaignLogs { stats: DeliveryStats::from_logs(&logs), logs })
        }
        CampaignsSubcommand::Receipt { log, status, error } => {
            let receipt = DeliveryReceipt { communication_log_id: log, status, error_message: error };
            print_json(&store.update_delivery_status(&receipt).await?)
        }
    }
}

async fn run_logs(store: &Store, command: LogsSubcommand) -> Result<(), CliError> {
    let now = OffsetDateTime::now_utc();
    store.fetch_all().await?;
    let customers = store.customers().await;
    match command {
        LogsSubcommand::List { customer, status, filter, page } => {
            let logs = match (customer, status) {
                (Some(customer), _) => store.customer_logs(&customer).await?,
                (None, Some(status)) => store.logs_with_status(status).await?,
                (None, None) => store.logs().await,
            };
            let logs = filter.query().apply(&logs, &customers, now);
            print_json(&Page::of(&logs, page.pager()))
        }
        LogsSubcommand::Export { campaign, filter, export } => {
            let (logs, campaign_name) = match campaign {
                Some(id) => {
                    let logs = store.campaign_logs(&id).await?;
                    let known = store.campaigns().await.into_iter().find(|c| c.id == id);
                    let name = match known {
                        Some(c) => c.name,
                        None => store.campaign(&id).await?.name,
                    };
                    (logs, Some(name))
                }
                None => (store.logs().await, None),
            };
            let logs = filter.query().apply(&logs, &customers, now);
            let csv = export::logs_csv(&logs, &customers)?;
            emit_csv(&csv, export::logs_filename(campaign_name.as_deref(), now), export.save)
        }
    }
}

async fn run_ai(store: &Store, kind: &str, data: &str) -> Result<(), CliError> {
    let payload: Value = serde_json::from_str(data)?;
    let request = AiRequest::from_tagged(kind, payload)?;
    print_json(&store.generate_ai_content(&request).await?)
}

async fn run_stats(store: &Store) -> Result<(), CliError> {
    store.fetch_all().await?;
    let snapshot = store.snapshot().await;
    print_json(&StatsReport {
        dashboard: DashboardStats::from_snapshot(&snapshot),
        delivery: DeliveryStats::from_logs(&snapshot.logs),
    })
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn emit_csv(csv: &str, filename: String, save: bool) -> Result<(), CliError> {
    if !save {
        print!("{csv}");
        return Ok(());
    }
    let path = PathBuf::from(filename);
    std::fs::write(&path, csv).map_err(|source| CliError::Write { path: path.clone(), source })?;
    info!(path = %path.display(), bytes = csv.len(), "export saved");
    eprintln!("saved {}", path.display());
    Ok(())
}
