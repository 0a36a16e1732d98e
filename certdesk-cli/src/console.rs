//! Interactive console over stdin/stdout.

use std::io::Write;

use anyhow::{Result, bail};
use certdesk_core::{CertDesk, TransferOutcome, TransferRequest};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

const SUGGEST_LIMIT: usize = 10;

const HELP: &str = "\
Commands:
  employee <surname>              find employees by surname
  suggest <prefix>                complete a surname
  client <name>                   find clients in both stores
  certs <client>                  list a client's certificates
  find <text>                     search certificates by name
  copy <surname> / <client> [--any]
                                  install the newest valid certificate
                                  (--any also accepts expired ones)
  undo                            remove the last installed certificate
  redo                            install it again
  remove <certificate>            delete from the operator's crypto store
  help                            show this text
  quit                            exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Employee(String),
    Suggest(String),
    Client(String),
    Certs(String),
    Find(String),
    Copy {
        surname: String,
        client: String,
        any: bool,
    },
    Undo,
    Redo,
    Remove(String),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let arg = |usage: &str| -> Result<String> {
            if rest.is_empty() {
                bail!("Usage: {}", usage);
            }
            Ok(rest.to_string())
        };

        let command = match verb.to_lowercase().as_str() {
            "employee" | "e" => Self::Employee(arg("employee <surname>")?),
            "suggest" => Self::Suggest(arg("suggest <prefix>")?),
            "client" | "c" => Self::Client(arg("client <name>")?),
            "certs" => Self::Certs(arg("certs <client>")?),
            "find" | "f" => Self::Find(arg("find <text>")?),
            "copy" => parse_copy(rest)?,
            "undo" => Self::Undo,
            "redo" => Self::Redo,
            "remove" => Self::Remove(arg("remove <certificate>")?),
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => bail!("Unknown command '{}', type 'help'", other),
        };
        Ok(command)
    }
}

fn parse_copy(rest: &str) -> Result<Command> {
    let mut any = false;
    let words: Vec<&str> = rest
        .split_whitespace()
        .filter(|w| {
            let flag = *w == "--any";
            any |= flag;
            !flag
        })
        .collect();
    let joined = words.join(" ");

    match joined.split_once('/') {
        Some((surname, client)) if !surname.trim().is_empty() && !client.trim().is_empty() => {
            Ok(Command::Copy {
                surname: surname.trim().to_string(),
                client: client.trim().to_string(),
                any,
            })
        }
        _ => bail!("Usage: copy <surname> / <client> [--any]"),
    }
}

/// Parse a 1-based menu answer into an index below `count`.
pub fn parse_choice(answer: &str, count: usize) -> Option<usize> {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

pub struct Console {
    desk: CertDesk,
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new(desk: CertDesk) -> Self {
        Self {
            desk,
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("{HELP}");
        loop {
            prompt("> ")?;
            let Some(line) = self.lines.next_line().await? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match Command::parse(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    debug!(?command, "Executing");
                    if let Err(e) = self.execute(command).await {
                        println!("Error: {e}");
                    }
                }
                Err(e) => println!("{e}"),
            }
        }
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Employee(query) => {
                let employees = self.desk.find_employees(&query).await?;
                if employees.is_empty() {
                    println!("No employees match '{query}'");
                }
                for employee in employees {
                    println!("  {}", employee.summary());
                }
            }
            Command::Suggest(prefix) => {
                for surname in self.desk.suggest_employees(&prefix, SUGGEST_LIMIT).await? {
                    println!("  {surname}");
                }
            }
            Command::Client(query) => {
                let clients = self.desk.find_clients(&query).await?;
                if clients.is_empty() {
                    println!("No clients match '{query}'");
                }
                for client in clients {
                    println!("  {} [{}] {}", client.name, client.root.label(), client.path.display());
                }
            }
            Command::Certs(query) => {
                let mut clients = self.desk.find_clients(&query).await?;
                let index = match clients.len() {
                    0 => bail!("No clients match '{}'", query),
                    1 => 0,
                    _ => {
                        let options = clients
                            .iter()
                            .map(|c| format!("{} [{}]", c.name, c.root.label()))
                            .collect();
                        match self.choose("client", options).await? {
                            Some(index) => index,
                            None => return Ok(()),
                        }
                    }
                };
                let client = clients.swap_remove(index);
                let certs = self.desk.list_certificates(&client).await?;
                if certs.is_empty() {
                    println!("{} has no certificates", client.name);
                }
                for cert in certs {
                    println!("  {} {}  {}", cert.status.mark(), cert.display_date(), cert.name);
                }
            }
            Command::Find(query) => {
                let found = self.desk.search_certificates(&query).await?;
                if found.is_empty() {
                    println!("Nothing matches '{query}'");
                }
                for (client, cert) in found {
                    println!(
                        "  {} {}  {} / {} [{}]",
                        cert.status.mark(),
                        cert.display_date(),
                        client.name,
                        cert.name,
                        client.root.label()
                    );
                }
            }
            Command::Copy {
                surname,
                client,
                any,
            } => self.copy(TransferRequest::new(surname, client).enforce_expiry(!any)).await?,
            Command::Undo => {
                let action = self.desk.undo().await?;
                println!("Removed {}", action.destination.display());
            }
            Command::Redo => {
                let action = self.desk.redo().await?;
                println!("Copied {} again", action.certificate);
            }
            Command::Remove(name) => {
                let path = self.desk.remove_from_operator_store(&name).await?;
                println!("Removed {}", path.display());
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
        Ok(())
    }

    async fn copy(&mut self, mut request: TransferRequest) -> Result<()> {
        loop {
            match self.desk.transfer(&request).await? {
                TransferOutcome::ChooseEmployee(employees) => {
                    let options = employees.iter().map(|e| e.summary()).collect();
                    let Some(index) = self.choose("employee", options).await? else {
                        return Ok(());
                    };
                    request = request.choose_employee(index);
                }
                TransferOutcome::ChooseClient(clients) => {
                    let options = clients
                        .iter()
                        .map(|c| format!("{} [{}] {}", c.name, c.root.label(), c.path.display()))
                        .collect();
                    let Some(index) = self.choose("client", options).await? else {
                        return Ok(());
                    };
                    request = request.choose_client(index);
                }
                TransferOutcome::Copied(action) => {
                    println!(
                        "Copied {} / {} for {}\n  -> {}",
                        action.client,
                        action.certificate,
                        action.employee.full_name(),
                        action.destination.display()
                    );
                    return Ok(());
                }
            }
        }
    }

    /// Numbered menu. `None` when the operator cancels with an empty line.
    async fn choose(&mut self, what: &str, options: Vec<String>) -> Result<Option<usize>> {
        println!("Several {what}s match:");
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, option);
        }

        loop {
            prompt(&format!("Choose {what} [1-{}, empty to cancel]: ", options.len()))?;
            let Some(answer) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if answer.trim().is_empty() {
                println!("Cancelled");
                return Ok(None);
            }
            match parse_choice(&answer, options.len()) {
                Some(index) => return Ok(Some(index)),
                None => println!("Enter a number between 1 and {}", options.len()),
            }
        }
    }
}

fn prompt(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{text}")?;
    stdout.flush()?;
    Ok(())
}
