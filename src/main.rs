pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use quizdesk::{
    app_dirs::AppDirs,
    authoring::{parse_script, render_sheet},
    config::{Config, ConfigStore, FileConfigStore},
    controller::{Notice, QuizController},
    editing::{SelectMode, TopicEditor},
    error::StartError,
    history::{export_csv, per_topic, FileHistoryStore, HistoryStore, HistorySummary},
    library,
    question::{AnswerField, Resource},
    resume::{FileResumeStore, ResumeStore, ResumeToken},
    runtime::{CrosstermEventSource, FixedTicker, QuizEvent, Runner},
    session::SessionConfig,
    topic_store::{FileTopicStore, TopicId, TopicStore},
    util::format_clock,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    cell::Cell,
    error::Error,
    fs,
    io::{self, stdin},
    path::{Path, PathBuf},
    rc::Rc,
};
use webbrowser::Browser;

/// timed multiple-choice quizzes over local topic files
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal quiz desk: keep topic question sets on disk, take timed quizzes with partial credit, and track every attempt in a local history."
)]
pub struct Cli {
    /// directory holding topic files and quiz history
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,

    /// seconds granted per quiz question
    #[clap(long, global = true)]
    seconds_per_question: Option<u32>,

    /// hide the countdown while quizzing
    #[clap(long, global = true)]
    hide_timer: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// list topics and their question counts
    Topics,
    /// take a timed quiz; without a topic the last quizzed topic is resumed
    Quiz {
        topic: Option<String>,
        /// draw from every topic
        #[clap(long, conflicts_with = "topic")]
        all: bool,
        /// number of questions
        #[clap(short = 'n', long)]
        count: Option<usize>,
    },
    /// show past quiz attempts
    History {
        /// delete every recorded attempt
        #[clap(long)]
        reset: bool,
        /// write the history as csv
        #[clap(long, value_name = "FILE")]
        export: Option<PathBuf>,
    },
    /// list questions marked as doubtful
    Doubts,
    /// print topics as a reading sheet
    Read {
        topic: Option<String>,
        /// include answers and resources
        #[clap(long)]
        answers: bool,
    },
    /// add a topic from a `{"questions": [...]}` file
    Import {
        file: PathBuf,
        #[clap(long)]
        name: String,
    },
    /// author a topic from a /q /o /c /p /r script
    Create {
        script: PathBuf,
        /// name of the new topic
        #[clap(long)]
        out: String,
        /// also write a printable sheet
        #[clap(long, value_name = "FILE")]
        sheet: Option<PathBuf>,
        #[clap(long, requires = "sheet")]
        solutions: bool,
        #[clap(long, requires = "sheet")]
        resources: bool,
    },
    /// change answers, doubt mark or resource of one question
    Edit {
        topic: String,
        /// question number, starting at 1
        index: usize,
        /// option number to select
        #[clap(long)]
        option: Option<usize>,
        #[clap(long, value_enum, default_value_t = FieldArg::Proposed)]
        field: FieldArg,
        /// toggle the option instead of replacing the answer
        #[clap(long)]
        multi: bool,
        #[clap(long, value_enum)]
        doubt: Option<Switch>,
        /// link or reference; empty clears it
        #[clap(long)]
        resource: Option<String>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum FieldArg {
    Proposed,
    Correct,
}

impl From<FieldArg> for AnswerField {
    fn from(f: FieldArg) -> Self {
        match f {
            FieldArg::Proposed => AnswerField::Proposed,
            FieldArg::Correct => AnswerField::Correct,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Cli {
    /// Stored config with command-line overrides applied
    fn apply_to(&self, mut config: Config) -> Config {
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(secs) = self.seconds_per_question {
            config.seconds_per_question = secs;
        }
        if self.hide_timer {
            config.show_timer = false;
        }
        if let Some(Command::Quiz { count: Some(n), .. }) = &self.command {
            config.question_count = *n;
        }
        config
    }
}

pub type Desk = QuizController<FileTopicStore, FileHistoryStore>;

#[derive(Debug, Clone, PartialEq)]
pub enum QuizTarget {
    Topic(TopicId),
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Quiz,
    Results,
}

pub struct App {
    pub desk: Desk,
    pub state: AppState,
    pub target: QuizTarget,
    pub question_count: usize,
    pub current: usize,
    pub result_cursor: usize,
    pub notice: Option<Notice>,
    pub show_timer: bool,
    pub active: Rc<Cell<bool>>,
    resume: FileResumeStore,
}

impl App {
    pub fn new(
        topics: FileTopicStore,
        history: FileHistoryStore,
        resume: FileResumeStore,
        config: &Config,
    ) -> Self {
        let active = Rc::new(Cell::new(false));
        let flag = Rc::clone(&active);
        let desk = QuizController::new(
            topics,
            history,
            SessionConfig {
                seconds_per_question: config.seconds_per_question,
            },
            move |on: bool| {
                flag.set(on);
                log::debug!("quiz activity: {on}");
            },
        );
        Self {
            desk,
            state: AppState::Quiz,
            target: QuizTarget::All,
            question_count: config.question_count,
            current: 0,
            result_cursor: 0,
            notice: None,
            show_timer: config.show_timer,
            active,
            resume,
        }
    }

    pub fn start(&mut self, target: QuizTarget) -> Result<(), StartError> {
        let notices = match &target {
            QuizTarget::Topic(id) => self.desk.start_topic(id, self.question_count)?,
            QuizTarget::All => self.desk.start_complete_test(self.question_count)?,
        };
        self.target = target;
        self.state = AppState::Quiz;
        self.current = 0;
        self.result_cursor = 0;
        self.show_notices(notices);
        self.remember_position();
        Ok(())
    }

    /// Jumps to a question, clamped to the quiz
    pub fn go_to(&mut self, index: usize) {
        let last = self.desk.session().question_count().saturating_sub(1);
        self.current = index.min(last);
        self.remember_position();
    }

    pub fn title(&self) -> String {
        match &self.target {
            QuizTarget::Topic(id) => self.desk.topics().display_name(id),
            QuizTarget::All => "Complete test".to_string(),
        }
    }

    pub fn on_tick(&mut self) {
        if self.state != AppState::Quiz {
            return;
        }
        let notices = self.desk.tick();
        if !self.desk.session().is_active() {
            self.show_results(notices);
        }
    }

    /// Returns false once the app should quit
    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            let notices = self.desk.abandon();
            self.show_notices(notices);
            return false;
        }

        match self.state {
            AppState::Quiz => match key.code {
                KeyCode::Char(c @ '1'..='4') => {
                    let number = c as usize - '0' as usize;
                    let value = self
                        .desk
                        .session()
                        .question(self.current)
                        .and_then(|q| q.option_at(number))
                        .map(str::to_owned);
                    if let Some(value) = value {
                        self.desk.record_answer(self.current, &value);
                    }
                }
                KeyCode::Left => self.go_to(self.current.saturating_sub(1)),
                KeyCode::Right => self.go_to(self.current + 1),
                KeyCode::Char('d') => {
                    self.desk.toggle_doubt(self.current);
                }
                KeyCode::Enter => {
                    let notices = self.desk.finish();
                    self.show_results(notices);
                }
                KeyCode::Esc => {
                    let notices = self.desk.abandon();
                    self.show_results(notices);
                }
                _ => {}
            },
            AppState::Results => match key.code {
                KeyCode::Left => self.result_cursor = self.result_cursor.saturating_sub(1),
                KeyCode::Right => {
                    let last = self.desk.session().results().map_or(0, |r| r.len().saturating_sub(1));
                    self.result_cursor = (self.result_cursor + 1).min(last);
                }
                KeyCode::Char('o') => self.open_resource(),
                KeyCode::Char('r') => {
                    if let Err(e) = self.start(self.target.clone()) {
                        self.notice = Some(Notice::error(e.to_string()));
                    }
                }
                KeyCode::Esc | KeyCode::Char('q') => return false,
                _ => {}
            },
        }
        true
    }

    fn show_results(&mut self, notices: Vec<Notice>) {
        self.state = AppState::Results;
        self.result_cursor = 0;
        self.show_notices(notices);
    }

    /// Errors take the status line over informational notices
    fn show_notices(&mut self, notices: Vec<Notice>) {
        let worst = notices
            .iter()
            .find(|n| n.is_error())
            .or_else(|| notices.last())
            .cloned();
        if worst.is_some() {
            self.notice = worst;
        }
    }

    fn remember_position(&self) {
        if let QuizTarget::Topic(id) = &self.target {
            if let Err(e) = self.resume.save(&ResumeToken::new(id.clone(), self.current)) {
                log::warn!("resume position not saved: {e}");
            }
        }
    }

    fn open_resource(&mut self) {
        let Some(result) = self
            .desk
            .session()
            .results()
            .and_then(|r| r.get(self.result_cursor))
        else {
            return;
        };
        match result.question.resource_kind() {
            Some(Resource::Link(url)) if Browser::is_available() => {
                if let Err(e) = webbrowser::open(url) {
                    self.notice = Some(Notice::error(format!("Could not open {url}: {e}")));
                }
            }
            Some(Resource::Link(url)) => {
                self.notice = Some(Notice::info(format!("No browser available, see {url}")));
            }
            Some(Resource::Reference(text)) => self.notice = Some(Notice::info(text.to_string())),
            None => {}
        }
    }
}

fn init_logging(log_file: Option<&Path>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    // the TUI owns the terminal, so its logs go to a file
    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder
                    .filter_level(log::LevelFilter::Info)
                    .parse_default_env()
                    .target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    let _ = builder.try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = cli.apply_to(FileConfigStore::new().load());
    let dirs = AppDirs::resolve(config.data_dir.as_deref());

    let command = cli.command.clone().unwrap_or(Command::Quiz {
        topic: None,
        all: false,
        count: None,
    });
    let is_tui = matches!(command, Command::Quiz { .. });
    init_logging(is_tui.then(|| dirs.log_path()).as_deref());

    let topics = FileTopicStore::from_dirs(&dirs);
    if let Err(e) = topics.seed_starter_topics() {
        log::warn!("starter topics not written: {e}");
    }
    let history = FileHistoryStore::with_path(dirs.history_path());

    match command {
        Command::Topics => list_topics(&topics),
        Command::Quiz { topic, all, .. } => {
            let resume = FileResumeStore::with_path(dirs.resume_path());
            let (target, position) = if all {
                (QuizTarget::All, 0)
            } else {
                pick_topic(&topics, &resume, topic.as_deref())?
            };
            run_quiz(App::new(topics, history, resume, &config), target, position)
        }
        Command::History { reset, export } => show_history(&history, reset, export.as_deref()),
        Command::Doubts => list_doubts(&topics),
        Command::Read { topic, answers } => read_topics(&topics, topic.as_deref(), answers),
        Command::Import { file, name } => {
            let bytes = fs::read(&file)?;
            let id = topics.import_topic(&name, &bytes)?;
            println!("imported {} as topic {id}", file.display());
            Ok(())
        }
        Command::Create {
            script,
            out,
            sheet,
            solutions,
            resources,
        } => {
            let questions = parse_script(&fs::read_to_string(&script)?)?;
            let id = topics.save_named_topic(&out, &questions)?;
            println!("created topic {id} with {} questions", questions.len());
            if let Some(sheet) = sheet {
                fs::write(&sheet, render_sheet(&questions, solutions, resources))?;
                println!("sheet written to {}", sheet.display());
            }
            Ok(())
        }
        Command::Edit {
            topic,
            index,
            option,
            field,
            multi,
            doubt,
            resource,
        } => edit_question(
            &topics,
            &topic,
            index,
            EditRequest {
                option,
                field: field.into(),
                mode: if multi { SelectMode::Multi } else { SelectMode::Auto },
                doubt: doubt.map(|d| d == Switch::On),
                resource,
            },
        ),
    }
}

/// Chooses the topic and the question to open at. An explicit topic starts at the
/// beginning; otherwise the resume token is honoured while its topic still exists.
fn pick_topic(
    topics: &FileTopicStore,
    resume: &FileResumeStore,
    requested: Option<&str>,
) -> Result<(QuizTarget, usize), Box<dyn Error>> {
    if let Some(raw) = requested {
        return Ok((QuizTarget::Topic(TopicId::parse(raw)?), 0));
    }
    let listed = topics.list_topics()?;
    if let Some(token) = resume.load() {
        if listed.contains(&token.topic) {
            return Ok((QuizTarget::Topic(token.topic), token.question_index));
        }
        log::warn!("resume token names missing topic {}, discarding it", token.topic);
        resume.clear()?;
    }
    let first = listed
        .into_iter()
        .next()
        .ok_or("no topics yet, add one with `quizdesk import`")?;
    Ok((QuizTarget::Topic(first), 0))
}

fn run_quiz(mut app: App, target: QuizTarget, position: usize) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    app.start(target)?;
    app.go_to(position);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = start_tui(&mut terminal, &mut app);
    if res.is_err() {
        for notice in app.desk.abandon().iter().filter(|n| n.is_error()) {
            log::error!("{}", notice.message);
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(entry) = app.desk.last_entry() {
        println!(
            "{}: {:.1}% ({:.2}/{}) in {}",
            entry.topic,
            entry.percentage,
            entry.total_score,
            entry.total_questions,
            format_clock(entry.time_spent_seconds as u64)
        );
    }
    res
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(CrosstermEventSource::new(), FixedTicker::seconds());

    loop {
        terminal.draw(|f| ui(app, f))?;
        match runner.step() {
            QuizEvent::Tick => app.on_tick(),
            QuizEvent::Resize => {}
            QuizEvent::Key(key) => {
                let was_results = app.state == AppState::Results;
                if !app.on_key(key) {
                    break;
                }
                // a retry restarts the countdown
                if was_results && app.state == AppState::Quiz {
                    runner.reset();
                }
            }
        }
    }
    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    ui::screen::current_screen(&app.state).render(app, f);
}

fn list_topics(topics: &FileTopicStore) -> Result<(), Box<dyn Error>> {
    for t in library::load_all(topics)? {
        println!("{:<24} {:<32} {:>3} questions", t.id, t.name, t.questions.len());
    }
    Ok(())
}

fn show_history(
    history: &FileHistoryStore,
    reset: bool,
    export: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    if reset {
        history.reset()?;
        println!("history cleared");
        return Ok(());
    }
    let entries = history.list()?;
    if let Some(path) = export {
        export_csv(&entries, fs::File::create(path)?)?;
        println!("{} attempts written to {}", entries.len(), path.display());
        return Ok(());
    }

    let summary = HistorySummary::from_entries(&entries);
    println!(
        "{} quizzes, {} questions, {} correct, {} partial, {:.1}% average, {} spent",
        summary.total_quizzes,
        summary.total_questions,
        summary.total_correct,
        summary.total_partial,
        summary.average_percentage,
        format_clock(summary.total_time_spent)
    );
    for (topic, count, average) in per_topic(&entries) {
        println!("  {topic:<24} {count:>3} quizzes {average:>6.1}%");
    }
    println!();
    for e in &entries {
        println!(
            "{}  {:<24} {:>6.1}%  {:>5.2}/{:<3} {}",
            e.date.format("%Y-%m-%d %H:%M"),
            e.topic,
            e.percentage,
            e.total_score,
            e.total_questions,
            format_clock(e.time_spent_seconds as u64)
        );
    }
    Ok(())
}

fn list_doubts(topics: &FileTopicStore) -> Result<(), Box<dyn Error>> {
    let doubts = library::doubts(topics)?;
    if doubts.is_empty() {
        println!("no questions marked as doubtful");
    }
    for t in doubts {
        println!("{}\n", t.name);
        print!("{}", render_sheet(&t.questions, true, true));
    }
    Ok(())
}

fn read_topics(
    topics: &FileTopicStore,
    only: Option<&str>,
    answers: bool,
) -> Result<(), Box<dyn Error>> {
    if let Some(raw) = only {
        let id = TopicId::parse(raw)?;
        let questions = topics.read_topic(&id)?;
        println!("== {} ==\n", topics.display_name(&id));
        print!("{}", render_sheet(&questions, answers, answers));
        return Ok(());
    }
    for t in library::load_all(topics)? {
        println!("== {} ==\n", t.name);
        print!("{}", render_sheet(&t.questions, answers, answers));
    }
    Ok(())
}

struct EditRequest {
    option: Option<usize>,
    field: AnswerField,
    mode: SelectMode,
    doubt: Option<bool>,
    resource: Option<String>,
}

fn edit_question(
    topics: &FileTopicStore,
    topic: &str,
    number: usize,
    req: EditRequest,
) -> Result<(), Box<dyn Error>> {
    let mut editor = TopicEditor::open(topics, TopicId::parse(topic)?)?;
    let index = number
        .checked_sub(1)
        .ok_or("question numbers start at 1")?;

    if let Some(option) = req.option {
        let value = editor
            .questions()
            .get(index)
            .and_then(|q| q.option_at(option))
            .map(str::to_owned)
            .ok_or_else(|| format!("question {number} has no option {option}"))?;
        editor.select_option(index, req.field, &value, req.mode)?;
    }
    if let Some(marked) = req.doubt {
        editor.set_doubt(index, marked)?;
    }
    if let Some(resource) = &req.resource {
        editor.set_resource(index, resource)?;
    }

    let question = editor
        .questions()
        .get(index)
        .ok_or_else(|| format!("topic {topic} has no question {number}"))?;
    print!("{}", render_sheet(std::slice::from_ref(question), true, true));
    if question.is_doubt_marked {
        println!("(marked as doubtful)");
    }
    Ok(())
}
