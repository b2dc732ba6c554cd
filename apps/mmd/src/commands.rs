use std::io::Write;
use std::net::SocketAddr;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::api_client::ApiClient;
use crate::chat::{ChatSession, TurnOutcome};
use crate::cli::{form_errors, Cli, Commands, ProfileArgs, SearchTarget, SessionAction};
use crate::config::Config;
use crate::models::chat::{ChatMessage, Role};
use crate::models::session::{format_time_left, SessionInfo, SessionStats, SessionStatus};
use crate::models::stats::{InterestStat, UserStatResponse};
use crate::session::cookies::short_id;
use crate::stub::{self, StubState};

/// Slash commands understood inside the chat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplCommand {
    Reset,
    Stats,
    Session,
    NewSession,
    Help,
    Quit,
}

impl ReplCommand {
    /// `None` means the line is a chat message.
    fn parse(line: &str) -> Option<ReplCommand> {
        match line.trim() {
            "/reset" => Some(ReplCommand::Reset),
            "/stats" => Some(ReplCommand::Stats),
            "/session" => Some(ReplCommand::Session),
            "/new" => Some(ReplCommand::NewSession),
            "/help" => Some(ReplCommand::Help),
            "/quit" | "/exit" => Some(ReplCommand::Quit),
            _ => None,
        }
    }
}

const REPL_HELP: &str = "/reset 대화 초기화 · /stats 시장 통계 · /session 세션 정보 · /new 새 세션 · /quit 종료";

pub async fn dispatch(cli: Cli, mut config: Config) -> Result<()> {
    if let Some(base_url) = cli.base_url {
        config.api_base_url = base_url;
    }

    match cli.command {
        Commands::StubServer { port } => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.stub_port)));
            stub::serve(addr, StubState::new(config.session_ttl)).await
        }
        Commands::Chat { profile } => {
            let client = connect(&config).await?;
            chat(client, &profile).await
        }
        Commands::Stats { profile } => {
            let client = connect(&config).await?;
            let form = profile.load_form()?;
            let profile = form.submit_profile().map_err(form_errors)?;
            let stats = client.get_user_stat(&profile).await?;
            print_user_stat(&stats);
            Ok(())
        }
        Commands::Session { action } => {
            let client = connect(&config).await?;
            match action {
                SessionAction::Info => print_session_info(&client.get_session_info().await?),
                SessionAction::Stats => print_session_stats(&client.get_session_stats().await?),
                SessionAction::Clear { force } => {
                    let cleared = client.clear_session(force).await?;
                    println!("{}", cleared.message);
                }
            }
            Ok(())
        }
        Commands::Search { target } => {
            let client = connect(&config).await?;
            let results = match target {
                SearchTarget::Jobs { query } => client.search_jobs(&query).await,
                SearchTarget::Universities { query } => client.search_universities(&query).await,
            };
            for result in results {
                println!("{result}");
            }
            Ok(())
        }
    }
}

async fn connect(config: &Config) -> Result<ApiClient> {
    let client = ApiClient::new(config)?;
    if config.clear_on_start {
        client.clear_backend_session_quietly().await;
    }
    Ok(client)
}

async fn chat(client: ApiClient, args: &ProfileArgs) -> Result<()> {
    let info = args.load_form()?.submit().map_err(form_errors)?;
    let mut session = ChatSession::new(client, info);

    print_message(&ChatMessage::user(session.info().candidate_question.clone()));
    println!("⏳ 분석 중...");
    if let TurnOutcome::Failed(err) = session.start().await {
        warn!("{}", err.class().notice());
    }
    if let Some(reply) = session.last() {
        print_message(reply);
    }
    println!("{REPL_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ReplCommand::parse(&line) {
            Some(ReplCommand::Quit) => break,
            Some(ReplCommand::Help) => println!("{REPL_HELP}"),
            Some(ReplCommand::Reset) => match session.reset().await {
                Ok(()) => {
                    if let Some(notice) = session.last() {
                        print_message(notice);
                    }
                }
                Err(err) => println!("{}", err.class().user_message()),
            },
            Some(ReplCommand::Stats) => {
                match session.client().get_user_stat(&session.info().profile).await {
                    Ok(stats) => print_user_stat(&stats),
                    Err(err) => println!("{}", err.class().user_message()),
                }
            }
            Some(ReplCommand::Session) => match session.client().get_session_info().await {
                Ok(info) => print_session_info(&info),
                Err(err) => println!("{}", err.class().user_message()),
            },
            Some(ReplCommand::NewSession) => {
                session.client().force_new_session();
                info!("Next request will start a new backend session");
                println!("🔄 다음 메시지부터 새 세션으로 시작합니다.");
            }
            None => {
                if let Some(outcome) = session.send(&line).await {
                    if let TurnOutcome::Failed(err) = outcome {
                        warn!("{}", err.class().notice());
                    }
                    if let Some(reply) = session.last() {
                        print_message(reply);
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_message(message: &ChatMessage) {
    let speaker = match message.role {
        Role::User => "나",
        Role::Assistant => "MMD",
    };
    println!(
        "[{}] {speaker}: {}",
        message.timestamp.format("%H:%M"),
        message.content
    );
}

fn print_session_info(info: &SessionInfo) {
    let status = match SessionStatus::from_info(info) {
        SessionStatus::Active => "활성",
        SessionStatus::Expired => "만료",
        SessionStatus::Reset => "새 세션",
    };
    println!("세션: {} ({status})", short_id(&info.session_id));
    println!("메시지 수: {}", info.message_count);
    println!("남은 시간: {}", format_time_left(info.time_until_expiry));
}

fn print_session_stats(stats: &SessionStats) {
    if let Some(total) = stats.total_sessions {
        println!("전체 세션: {total}");
    }
    if let Some(active) = stats.active_sessions {
        println!("활성 세션: {active}");
    }
    if let Some(messages) = stats.total_messages {
        println!("전체 메시지: {messages}");
    }
    if let Some(current) = &stats.current_session {
        println!(
            "현재 세션: {} (대화 {}건)",
            current.session_id, current.chat_history_length
        );
    }
}

fn print_user_stat(stats: &UserStatResponse) {
    match &stats.interest {
        InterestStat::Count {
            interest,
            total_job,
        } => println!("{interest} 채용 공고: {total_job}건"),
        InterestStat::Message { message } => println!("{message}"),
        InterestStat::Error { error } => println!("통계 조회 실패: {error}"),
    }
    for (tech, count) in stats.tech_demand() {
        println!("  {tech}: {count}개 기업");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_commands() {
        assert_eq!(ReplCommand::parse(" /reset "), Some(ReplCommand::Reset));
        assert_eq!(ReplCommand::parse("/exit"), Some(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("/new"), Some(ReplCommand::NewSession));
        assert_eq!(ReplCommand::parse("/resetting"), None);
        assert_eq!(ReplCommand::parse("연봉은 얼마나 될까요?"), None);
    }
}
