//! Surgence 命令行前端
//!
//! 登录、看板、仪表盘、患者、登记、聊天，以及启动看板 Web 服务。

mod render;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use surgence_admin::{init_logging, ConfigManager, SurgenceConfig};
use surgence_client::{BackendClient, ChatClient, ChatStatus, Conversation, SessionStore};
use surgence_core::{PatientSearch, Session};
use surgence_web::{AppState, WebServer};
use surgence_workflow::{
    submit, Capability, CapabilitySet, DashboardHeader, DashboardSource, DateRange, IntakeForm,
    IntakeOutcome, RefreshController, Snapshot, StatusBoard,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "surgence")]
#[command(about = "Surgery status board front-end")]
struct Cli {
    /// 配置文件路径（TOML）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 登录并保存会话
    Login {
        #[arg(long)]
        email: String,
        /// 不提供时从标准输入读取
        #[arg(long)]
        password: Option<String>,
    },
    /// 清除会话
    Logout,
    /// 当前会话与可用页面
    Home,
    /// 手术状态看板
    Board {
        /// 查看指定日期（需要日期切换权限）
        #[arg(long)]
        date: Option<NaiveDate>,
        /// 持续刷新直到 Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// 仪表盘
    Dashboard {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        watch: bool,
    },
    /// 患者
    #[command(subcommand)]
    Patients(PatientsCommand),
    /// 登记新患者
    AddPatient(AddPatientArgs),
    /// 聊天；不带消息时进入交互模式
    Chat { message: Option<String> },
    /// 后端状态字典
    Statuses,
    /// 启动看板 Web 服务
    Serve,
}

#[derive(Subcommand, Debug)]
enum PatientsCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    Search {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        surgeon: Option<String>,
    },
    Show { patient_number: String },
}

#[derive(Args, Debug)]
struct AddPatientArgs {
    #[arg(long, default_value_t)]
    first_name: String,
    #[arg(long, default_value_t)]
    last_name: String,
    #[arg(long, default_value_t)]
    address: String,
    #[arg(long, default_value_t)]
    city: String,
    #[arg(long, default_value_t)]
    state: String,
    #[arg(long, default_value_t)]
    country: String,
    #[arg(long, default_value_t)]
    phone: String,
    #[arg(long, default_value_t)]
    email: String,
    #[arg(long, default_value_t)]
    room_no: String,
    #[arg(long, default_value_t)]
    procedure: String,
    /// 例如 2025-08-01T09:30
    #[arg(long, default_value_t)]
    scheduled_time: String,
    #[arg(long, default_value_t)]
    surgeon_name: String,
    #[arg(long, default_value_t)]
    note: String,
}

impl From<AddPatientArgs> for IntakeForm {
    fn from(args: AddPatientArgs) -> Self {
        IntakeForm {
            first_name: args.first_name,
            last_name: args.last_name,
            address: args.address,
            city: args.city,
            state: args.state,
            country: args.country,
            phone: args.phone,
            email: args.email,
            room_no: args.room_no,
            procedure: args.procedure,
            scheduled_time: args.scheduled_time,
            surgeon_name: args.surgeon_name,
            note: args.note,
        }
    }
}

/// 会话与依赖
struct App {
    config: SurgenceConfig,
    store: SessionStore,
    session: Session,
    caps: CapabilitySet,
    client: BackendClient,
}

impl App {
    async fn load(config: SurgenceConfig) -> Result<Self> {
        let store = SessionStore::new(config.session.path.clone());
        let session = store.load().await;
        let caps = CapabilitySet::for_session(&session);
        let client = BackendClient::new(config.client_config())?.with_session(session.clone());

        Ok(Self {
            config,
            store,
            session,
            caps,
            client,
        })
    }

    fn require(&self, capability: Capability) -> Result<()> {
        self.caps.require(capability)?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigManager::new(cli.config.as_deref())?.get_config().await;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging)?;

    let app = App::load(config).await?;
    if let Err(e) = run(cli.command, app).await {
        error!("Command failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(command: Command, app: App) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => read_line("Password: ").await?,
            };
            let session = app.store.login(&app.client, &email, &password).await?;
            println!("Logged in as {} ({})", session.display_name(), session.role);
        }
        Command::Logout => {
            app.store.logout().await?;
            println!("Logged out");
        }
        Command::Home => print!("{}", render::render_home(&app.session, &app.caps)),
        Command::Board { date, watch } => run_board(&app, date, watch).await?,
        Command::Dashboard { start, end, watch } => {
            run_dashboard(&app, DateRange { start, end }, watch).await?
        }
        Command::Patients(command) => run_patients(&app, command).await?,
        Command::AddPatient(args) => run_add_patient(&app, args.into()).await?,
        Command::Chat { message } => run_chat(&app, message).await?,
        Command::Statuses => {
            let statuses = app.client.statuses().await?;
            print!("{}", render::render_statuses(&statuses));
        }
        Command::Serve => run_serve(app).await?,
    }
    Ok(())
}

/// 打印快照；`watch` 时每次更新都重新打印，直到 Ctrl-C
async fn follow<T, R, P>(mut rx: watch::Receiver<Snapshot<T>>, watch: bool, ready: R, mut show: P) -> Result<()>
where
    T: Clone,
    R: Fn(&Snapshot<T>) -> bool,
    P: FnMut(&Snapshot<T>),
{
    loop {
        let snapshot = rx.borrow_and_update().clone();
        if ready(&snapshot) {
            show(&snapshot);
            if !watch {
                return Ok(());
            }
        }

        tokio::select! {
            changed = rx.changed() => changed.map_err(|_| anyhow!("Refresh stopped"))?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn run_board(app: &App, date: Option<NaiveDate>, watch: bool) -> Result<()> {
    app.require(Capability::ViewStatusBoard)?;
    let tz = app.config.board_timezone()?;

    let board = StatusBoard::activate(
        app.client.clone(),
        app.caps.clone(),
        tz,
        app.config.refresh_interval(),
    );
    if let Some(date) = date {
        board.go_to(date)?;
    }

    let target = board.selected_date();
    follow(
        board.subscribe(),
        watch,
        |s| !s.is_loading() && s.data.as_ref().map_or(true, |d| d.date == target),
        |s| {
            if watch {
                println!("----");
            }
            print!("{}", render::render_board(s, &tz));
        },
    )
    .await?;

    board.deactivate();
    Ok(())
}

async fn run_dashboard(app: &App, range: DateRange, watch: bool) -> Result<()> {
    app.require(Capability::ViewDashboard)?;
    let tz = app.config.board_timezone()?;
    let header = DashboardHeader::for_role(app.caps.role());

    let source = DashboardSource::new(app.client.clone(), range)?;
    let controller = RefreshController::activate(source, app.config.refresh_interval());

    follow(controller.subscribe(), watch, |s| !s.is_loading(), |s| match &s.data {
        Some(data) => print!("{}", render::render_dashboard(&header, data, &tz)),
        None => println!(
            "Unable to load the dashboard: {}",
            s.error.as_deref().unwrap_or("unknown error")
        ),
    })
    .await?;

    controller.deactivate();
    Ok(())
}

async fn run_patients(app: &App, command: PatientsCommand) -> Result<()> {
    app.require(Capability::ViewPatients)?;
    let tz = app.config.board_timezone()?;

    match command {
        PatientsCommand::List { page, limit } => {
            let page = app.client.list_patients(page, limit).await?;
            print!("{}", render::render_patient_page(&page, &tz));
        }
        PatientsCommand::Search {
            name,
            status,
            date,
            surgeon,
        } => {
            let search = PatientSearch {
                name,
                status,
                scheduled_date: date,
                surgeon,
            };
            if search.is_empty() {
                bail!("Provide at least one of --name, --status, --date or --surgeon");
            }
            let patients = app.client.search_patients(&search).await?;
            print!("{}", render::render_patients(&patients, &tz));
        }
        PatientsCommand::Show { patient_number } => {
            let patient = app
                .client
                .patient(&patient_number)
                .await
                .with_context(|| format!("Failed to load patient {}", patient_number))?;
            print!("{}", render::render_patient(&patient, &tz));
        }
    }
    Ok(())
}

async fn run_add_patient(app: &App, form: IntakeForm) -> Result<()> {
    app.require(Capability::AddPatient)?;
    let tz = app.config.board_timezone()?;

    match submit(&form, &tz, &app.client).await {
        IntakeOutcome::Created {
            patient,
            navigate_to,
            toast,
        } => {
            println!("{}", toast);
            println!("Patient number: {}", patient.patient_number);
            info!("Next page: {}", navigate_to);
            Ok(())
        }
        IntakeOutcome::Invalid { errors, toast } => {
            for (field, message) in errors.iter() {
                eprintln!("  {}: {}", field.label(), message);
            }
            Err(anyhow!(toast))
        }
        IntakeOutcome::Failed { toast } => Err(anyhow!(toast)),
    }
}

async fn run_chat(app: &App, message: Option<String>) -> Result<()> {
    app.require(Capability::UseChat)?;
    let chat = ChatClient::new(app.client.clone());
    let mut conversation = Conversation::new();

    if let Some(message) = message {
        let status = send_and_print(&chat, &mut conversation, &message).await;
        if status == ChatStatus::Error {
            bail!("Error occurred, please try again.");
        }
        return Ok(());
    }

    println!("Type your message, /quit to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/quit" {
            break;
        }
        send_and_print(&chat, &mut conversation, &line).await;
    }
    Ok(())
}

async fn send_and_print(chat: &ChatClient, conversation: &mut Conversation, message: &str) -> ChatStatus {
    let mut printed = conversation.messages().len();
    let mut last_progress: Option<String> = None;

    chat.send(conversation, message, |c| {
        for entry in &c.messages()[printed..] {
            println!("{}", render::render_chat_message(entry));
        }
        printed = c.messages().len();

        if let Some(progress) = c.progress() {
            if last_progress.as_deref() != Some(progress) {
                println!("... {}", progress);
                last_progress = Some(progress.to_string());
            }
        }
    })
    .await
}

async fn run_serve(app: App) -> Result<()> {
    let tz = app.config.board_timezone()?;
    let addr: SocketAddr = app
        .config
        .web_addr()
        .parse()
        .with_context(|| format!("Invalid listen address {}", app.config.web_addr()))?;

    let board = StatusBoard::activate(app.client, app.caps, tz, app.config.refresh_interval());
    let state = AppState {
        board: Arc::new(board),
        cadence: app.config.refresh_interval(),
        access_token: app.config.web.access_token.clone(),
    };

    WebServer::new(addr, state).run().await?;
    Ok(())
}

async fn read_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    lines
        .next_line()
        .await?
        .map(|line| line.trim_end().to_string())
        .context("No input")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_board_date() {
        let cli = Cli::try_parse_from(["surgence", "board", "--date", "2025-08-01"]).unwrap();
        match cli.command {
            Command::Board { date, watch } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 8, 1));
                assert!(!watch);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_add_patient_args_become_form() {
        let cli = Cli::try_parse_from([
            "surgence",
            "add-patient",
            "--first-name",
            "Mary",
            "--email",
            "mary@example.com",
        ])
        .unwrap();
        let Command::AddPatient(args) = cli.command else {
            panic!("expected add-patient");
        };
        let form: IntakeForm = args.into();
        assert_eq!(form.first_name, "Mary");
        assert!(form.validate(&chrono::FixedOffset::east_opt(0).unwrap()).is_err());
    }
}
