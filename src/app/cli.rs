use std::{
    io::{self, Write},
    time::Duration,
};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, terminal,
};

use pass_tasks::{EntryDetail, MainContext, NotificationSink, Operations, TaskState};

const PROMPT: &str = ">>> ";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct TerminalSink;

impl NotificationSink for TerminalSink {
    fn show_info(&self, message: &str) {
        print_above_prompt(&format!("[info] {}", message));
    }

    fn show_success(&self, message: &str) {
        print_above_prompt(&format!("[ok] {}", message));
    }

    fn show_error(&self, message: &str) {
        print_above_prompt(&format!("[error] {}", message));
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

enum Input {
    Line(String),
    Quit,
}

pub fn run_cli(context: MainContext, operations: Operations) -> io::Result<()> {
    println!("Password store ready. Type 'help' for commands or 'exit' to quit.");
    let _raw = RawMode::enable()?;
    let mut history: Vec<String> = Vec::new();

    loop {
        let input = match read_line(&context, &history)? {
            Input::Line(line) => line,
            Input::Quit => break,
        };
        if !input.trim().is_empty() {
            history.push(input.clone());
        }

        let mut args = input.split_whitespace();
        match args.next() {
            Some("list") => {
                operations.load_entries(|success, entries| {
                    if success {
                        print_above_prompt(&format!("{} entries:", entries.len()));
                        for entry in entries {
                            print_above_prompt(&format!("  {}", entry.path));
                        }
                    }
                });
            }
            Some("search") => {
                let query = args.collect::<Vec<_>>().join(" ");
                if query.is_empty() {
                    println!("\rSearch query must be specified.");
                } else {
                    operations.search_entries(&query, |success, entries| {
                        if success {
                            for entry in entries {
                                print_above_prompt(&format!("  {}", entry.path));
                            }
                        }
                    });
                }
            }
            Some("show") => match args.next() {
                Some(path) => {
                    operations.get_entry_details(path, |success, detail| {
                        if success {
                            print_detail(&detail);
                        }
                    });
                }
                None => println!("\rEntry path must be specified."),
            },
            Some(command @ ("insert" | "edit")) => {
                let is_new = command == "insert";
                match args.next() {
                    Some(path) => {
                        let content = args.collect::<Vec<_>>().join(" ");
                        operations.save_entry(path, &content, is_new, |_, message| {
                            print_above_prompt(&message);
                        });
                    }
                    None => println!("\rEntry path must be specified."),
                }
            }
            Some(operation @ ("pull" | "push")) => {
                operations.git_sync_named(operation, |_, message| print_above_prompt(&message));
            }
            Some("git") => {
                let operation = args.next().unwrap_or_default();
                operations.git_sync_named(operation, |_, message| print_above_prompt(&message));
            }
            Some("tasks") => {
                let manager = operations.task_manager();
                let ids = manager.active_task_ids();
                if ids.is_empty() {
                    println!("\rNo active tasks");
                } else {
                    println!("\r{}\t {} \t {} \t {}", "ID", "Name", "Progress", "Status");
                    println!("\r{}", "-".repeat(60));
                    for id in ids {
                        if let Some(task) = manager.get_task(id) {
                            let state = match task.state() {
                                TaskState::Pending => "pending".to_string(),
                                TaskState::Running if task.is_cancelled() => "cancelling".to_string(),
                                TaskState::Running => task.status_text(),
                                other => format!("{:?}", other),
                            };
                            println!(
                                "\r{}\t {} \t {:>3.0}% \t {}",
                                id,
                                task.name(),
                                task.progress() * 100.0,
                                state
                            );
                        }
                    }
                }
            }
            Some("cancel") => match args.next() {
                Some(name) => {
                    if operations.cancel(name) {
                        println!("\rSent cancel signal to '{}'", name);
                    } else {
                        println!("\rNo running operation named '{}'", name);
                    }
                }
                None => {
                    let count = operations.task_manager().get_active_task_count();
                    operations.task_manager().cancel_all_tasks();
                    println!("\rCancelled {} task(s)", count);
                }
            },
            Some("help") => print_help(),
            Some("exit") | Some("quit") => break,
            Some(cmd) => println!("\rUnknown command: {}. Please try again.", cmd),
            None => {}
        }
        context.dispatch_pending();
    }

    println!("\rExiting the program...");
    operations.shutdown();
    Ok(())
}

fn read_line(context: &MainContext, history: &[String]) -> io::Result<Input> {
    let mut input = String::new();
    let mut history_index = history.len();
    redraw(&input)?;

    loop {
        context.dispatch_pending();
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let key = match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => key,
            _ => continue,
        };

        match key.code {
            KeyCode::Enter => {
                println!("\r");
                return Ok(Input::Line(input));
            }
            KeyCode::Char('c') | KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                println!("\r");
                return Ok(Input::Quit);
            }
            KeyCode::Up => {
                if history_index > 0 {
                    history_index -= 1;
                    input = history[history_index].clone();
                }
            }
            KeyCode::Down => {
                if history_index < history.len() {
                    history_index += 1;
                }
                input = history.get(history_index).cloned().unwrap_or_default();
            }
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            _ => continue,
        }
        redraw(&input)?;
    }
}

fn redraw(input: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(terminal::ClearType::CurrentLine)
    )?;
    print!("{}{}", PROMPT, input);
    stdout.flush()
}

fn print_above_prompt(line: &str) {
    let mut stdout = io::stdout();
    let _ = execute!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(terminal::ClearType::CurrentLine)
    );
    println!("\r{}", line);
    print!("\r{}", PROMPT);
    let _ = stdout.flush();
}

fn print_detail(detail: &EntryDetail) {
    print_above_prompt(&detail.path);
    print_above_prompt(&format!("  password: {}", detail.password));
    if let Some(username) = &detail.username {
        print_above_prompt(&format!("  username: {}", username));
    }
    if let Some(url) = &detail.url {
        print_above_prompt(&format!("  url: {}", url));
    }
    for line in detail.notes.lines() {
        print_above_prompt(&format!("  {}", line));
    }
}

fn print_help() {
    for line in [
        "list                      list every entry",
        "search <query>            search entries by path",
        "show <path>               decrypt an entry",
        "insert <path> <content>   create an entry",
        "edit <path> <content>     overwrite an entry",
        "pull | push | git <op>    sync with the remote",
        "tasks                     show running tasks",
        "cancel [name]             cancel one operation, or everything",
        "exit                      quit",
    ] {
        println!("\r{}", line);
    }
}
