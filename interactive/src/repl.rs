//! Line-oriented front end over the client.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use pickboard_shared::{NewTopic, RowKind, TimeFrame, Topic, TopicFilter, TopicId, TopicSort};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::auth::{Auth, SignupForm};
use crate::client::Client;
use crate::comments::CommentThread;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::likes::LikeTarget;
use crate::notice::{Notice, NoticeKind};
use crate::topics::{TopicBoard, TopicPage};

#[derive(Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Newest,
    Likes,
}

impl From<SortArg> for TopicSort {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Newest => TopicSort::CreatedAt,
            SortArg::Likes => TopicSort::LikeCount,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Log in with email and password
    Login { email: String, password: String },
    /// Create an account
    Signup {
        email: String,
        username: String,
        password: String,
        confirm_password: String,
    },
    Logout,
    /// Show the signed-in user with stats and recent activity
    Whoami,
    /// Change your username
    Rename { username: String },
    /// List topics
    Topics {
        #[arg(long)]
        page: Option<usize>,
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Drop the category and search filters
        #[arg(long, conflicts_with_all = ["category", "search"])]
        clear: bool,
    },
    /// Pin or unpin a topic on the list
    Pin { topic: TopicId },
    /// Start a new topic with 2 to 4 options
    Create {
        title: String,
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long = "option", required = true)]
        options: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete one of your topics
    DeleteTopic { topic: TopicId },
    /// Open a topic with its chart and comments
    Open { topic: TopicId },
    /// Vote for option INDEX (1-based) on the open topic, or on a listed one
    Vote {
        index: usize,
        #[arg(long)]
        topic: Option<TopicId>,
    },
    /// Like the open topic, or one of its comments or replies
    Like {
        #[arg(long, conflicts_with = "reply")]
        comment: Option<i64>,
        #[arg(long)]
        reply: Option<i64>,
    },
    /// Vote history of the open topic (1H, 6H, 1D, 1W, 1M, ALL)
    Chart { frame: Option<TimeFrame> },
    /// Show a page of comments on the open topic
    Comments { page: Option<usize> },
    Comment { text: String },
    /// Reply to a comment, or to a reply with --to
    Reply {
        comment: i64,
        text: String,
        #[arg(long)]
        to: Option<i64>,
    },
    EditComment { id: i64, text: String },
    DeleteComment { id: i64 },
    EditReply { id: i64, text: String },
    DeleteReply { id: i64 },
    #[command(alias = "exit")]
    Quit,
}

enum LoopAction {
    Continue,
    Exit,
}

struct Repl {
    client: Client,
    auth: Auth,
    board: TopicBoard,
    open: Option<(TopicPage, CommentThread)>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

pub async fn run(config: ClientConfig) -> Result<()> {
    let (tx, notices) = mpsc::unbounded_channel();
    let client = Client::new(&config, Arc::new(tx))?;
    let mut repl = Repl {
        auth: Auth::new(client.clone()),
        board: TopicBoard::new(client.clone()),
        client,
        open: None,
        notices,
    };

    println!("Pickboard ready. Type 'help' for a list of commands.");
    if repl.auth.start().await {
        if let Some(user) = repl.client.session().snapshot().user {
            println!("Signed in as {}.", user.username);
        }
    }
    repl.flush_notices();

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        print!("pickboard> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            println!("Bye");
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let tokens = match shell_words::split(trimmed) {
            Ok(tokens) => tokens,
            Err(err) => {
                println!("Unable to parse command: {err}");
                continue;
            }
        };
        let command = match Line::try_parse_from(tokens) {
            Ok(line) => line.command,
            Err(err) => {
                // Also covers `help`.
                let _ = err.print();
                continue;
            }
        };

        let action = repl.handle(command).await;
        repl.flush_notices();
        match action {
            Ok(LoopAction::Continue) => {}
            Ok(LoopAction::Exit) => break,
            // Already shown as a notice.
            Err(err) => tracing::debug!(error = %err, "command failed"),
        }
    }
    Ok(())
}

impl Repl {
    fn flush_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            let tag = match notice.kind {
                NoticeKind::Success => "ok",
                NoticeKind::Error => "error",
                NoticeKind::LoginRequired => "login",
                NoticeKind::SessionExpired => "session",
            };
            println!("[{tag}] {}", notice.message);
        }
    }

    fn open_page(&self) -> Result<&(TopicPage, CommentThread), ApiError> {
        self.open.as_ref().ok_or_else(|| {
            let err = ApiError::Invalid("Open a topic first: open <id>".into());
            self.client.report(&err, "");
            err
        })
    }

    async fn handle(&mut self, command: Command) -> Result<LoopAction, ApiError> {
        match command {
            Command::Login { email, password } => {
                self.auth.login(&email, &password).await?;
            }
            Command::Signup {
                email,
                username,
                password,
                confirm_password,
            } => {
                let form = SignupForm {
                    email,
                    username,
                    password,
                    confirm_password,
                };
                self.auth.signup(&form).await?;
            }
            Command::Logout => {
                self.auth.logout().await?;
            }
            Command::Whoami => {
                let user = self.auth.profile().await?;
                println!("{} <{}> (#{})", user.username, user.email, user.id);
                let stats = self.auth.stats().await?;
                println!(
                    "topics {} | votes {} | likes {}",
                    stats.topics, stats.votes, stats.likes
                );
                for item in self.auth.activity().await? {
                    println!("  {}  {}", item.created_at, item.title);
                }
            }
            Command::Rename { username } => {
                self.auth.update_username(&username).await?;
            }
            Command::Topics {
                page,
                sort,
                category,
                search,
                clear,
            } => {
                if let Some(sort) = sort {
                    self.board.set_sort(sort.into()).await?;
                }
                if clear {
                    self.board.set_filter(TopicFilter::default()).await?;
                } else if category.is_some() || search.is_some() {
                    self.board.set_filter(TopicFilter { category, search }).await?;
                }
                match page {
                    Some(page) => self.board.go_to_page(page).await?,
                    None => self.board.load().await?,
                }
                self.print_board();
            }
            Command::Pin { topic } => {
                self.board.toggle_pin(topic).await?;
                self.print_board();
            }
            Command::Create {
                title,
                category,
                options,
                description,
            } => {
                let topic = NewTopic {
                    title,
                    category,
                    vote_options: options,
                    description,
                };
                let created = self.board.create(&topic).await?;
                println!("Created topic #{}", created.id);
            }
            Command::DeleteTopic { topic } => {
                self.board.delete(topic).await?;
            }
            Command::Open { topic } => {
                let page = TopicPage::new(self.client.clone(), topic);
                let thread = CommentThread::new(self.client.clone(), topic);
                let loaded = page.load().await?;
                let _ = thread.load().await;
                print_topic(&loaded);
                self.open = Some((page, thread));
                self.print_comments()?;
            }
            Command::Vote { index, topic } => {
                let index = index
                    .checked_sub(1)
                    .ok_or_else(|| ApiError::Invalid("Options are numbered from 1.".into()));
                let index = self.client.reported(index, "")?;
                match topic {
                    Some(id) => {
                        self.board.vote(id, index).await?;
                    }
                    None => {
                        let (page, _) = self.open_page()?;
                        if page.vote(index).await?.is_none() {
                            println!("You have already voted on this topic.");
                        }
                        if let Some(topic) = page.topic() {
                            print_topic(&topic);
                        }
                    }
                }
            }
            Command::Like { comment, reply } => {
                let (page, thread) = self.open_page()?;
                match (comment, reply) {
                    (Some(id), _) => {
                        thread.toggle_like(LikeTarget::Comment(id)).await?;
                    }
                    (None, Some(id)) => {
                        thread.toggle_like(LikeTarget::Reply(id)).await?;
                    }
                    (None, None) => {
                        page.toggle_like().await?;
                    }
                }
            }
            Command::Chart { frame } => {
                let (page, _) = self.open_page()?;
                let frame = frame.unwrap_or(page.snapshot().frame);
                let series = page.load_series(frame).await?;
                println!("Votes over {frame}");
                for point in series {
                    let counts: Vec<String> =
                        point.tallies.iter().map(|t| t.count.to_string()).collect();
                    println!("  {}  {}", point.label, counts.join(" / "));
                }
            }
            Command::Comments { page } => {
                let (_, thread) = self.open_page()?;
                if let Some(page) = page {
                    thread.go_to_page(page);
                }
                self.print_comments()?;
            }
            Command::Comment { text } => {
                self.open_page()?.1.post(&text).await?;
                self.print_comments()?;
            }
            Command::Reply { comment, text, to } => {
                self.open_page()?.1.reply(comment, to, &text).await?;
                self.print_comments()?;
            }
            Command::EditComment { id, text } => {
                self.open_page()?.1.edit(id, &text).await?;
            }
            Command::DeleteComment { id } => {
                self.open_page()?.1.remove(id).await?;
            }
            Command::EditReply { id, text } => {
                self.open_page()?.1.edit_reply(id, &text).await?;
            }
            Command::DeleteReply { id } => {
                self.open_page()?.1.remove_reply(id).await?;
            }
            Command::Quit => return Ok(LoopAction::Exit),
        }
        Ok(LoopAction::Continue)
    }

    fn print_board(&self) {
        let state = self.board.snapshot();
        if state.board.is_empty() {
            println!("No topics yet.");
            return;
        }
        for topic in state.board.topics() {
            let pin = if topic.is_pinned { "*" } else { " " };
            println!(
                "{pin} #{:<5} {} [{}]  {} votes, {} likes, {} comments",
                topic.id,
                topic.title,
                topic.category,
                topic.total_votes,
                topic.like_count,
                topic.comment_count
            );
        }
        println!(
            "page {} of {} ({} topics)",
            state.pager.page(),
            state.total_pages().max(1),
            state.total
        );
    }

    fn print_comments(&self) -> Result<(), ApiError> {
        let (_, thread) = self.open_page()?;
        let state = thread.snapshot();
        let viewer = self.client.session().user_id();
        for row in state.rows(viewer) {
            let indent = "  ".repeat(row.depth as usize);
            let (id, author, content, likes, liked) = match row.kind {
                RowKind::Comment(c) => (
                    format!("c{}", c.id),
                    &c.username,
                    &c.content,
                    c.like_count,
                    c.has_liked,
                ),
                RowKind::Reply(r) => (
                    format!("r{}", r.id),
                    &r.username,
                    &r.content,
                    r.like_count,
                    r.has_liked,
                ),
            };
            let heart = if liked { "♥" } else { "♡" };
            let mut actions = Vec::new();
            if row.affordances.reply {
                actions.push("reply");
            }
            if row.affordances.edit {
                actions.push("edit");
            }
            if row.affordances.delete {
                actions.push("delete");
            }
            println!("{indent}{id} {author}: {content}  {heart}{likes}  {}", actions.join(" "));
        }
        println!(
            "comments page {} of {}",
            state.pager.page(),
            state.total_pages().max(1)
        );
        Ok(())
    }
}

fn print_topic(topic: &Topic) {
    println!("#{} {} [{}]", topic.id, topic.title, topic.category);
    if let Some(description) = topic.description.as_deref().filter(|d| !d.is_empty()) {
        println!("  {description}");
    }
    for (i, option) in topic.options.iter().enumerate() {
        let count = topic.vote_counts.get(i).copied().unwrap_or(0);
        let mark = if topic.user_vote_index == Some(i) { ">" } else { " " };
        println!(
            "{mark} {}. {option}  {count} ({}%)",
            i + 1,
            topic.percent(i)
        );
    }
    println!(
        "  {} votes, {} likes{}",
        topic.total_votes,
        topic.like_count,
        if topic.has_liked { " (liked)" } else { "" }
    );
}
