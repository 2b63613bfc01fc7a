//! The interactive read-dispatch-render loop.

use std::future::Future;
use std::io::Write;
use std::str::FromStr;

use futures::FutureExt;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use tendrils_engine::autoplay::{self, AbortReason, AutoplayConfig, AutoplayOutcome};
use tendrils_engine::sheet::{AbilityScores, CharacterSheet};
use tendrils_engine::{
    Command, GameApi, GameStatus, Outcome, ParseFailure, PermissionDenied, Router, SessionState,
    Verb, is_permitted, parse, prompt,
};

use crate::display::{
    print_error, print_info, render_event, render_help, render_report, render_winner,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Repl<A> {
    router: Router<A>,
    session: SessionState,
    input: Lines<BufReader<Stdin>>,
    autoplay: AutoplayConfig,
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
fn interrupt() -> impl Future<Output = ()> {
    async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn show_prompt(text: &str) -> anyhow::Result<()> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(())
}

impl<A: GameApi> Repl<A> {
    pub fn new(router: Router<A>, autoplay: AutoplayConfig) -> Self {
        Self {
            router,
            session: SessionState::new(),
            input: BufReader::new(tokio::io::stdin()).lines(),
            autoplay,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            self.sync().await;
            show_prompt(&prompt(&self.session))?;
            let line = tokio::select! {
                line = self.input.next_line() => line?,
                _ = interrupt() => {
                    println!();
                    None
                }
            };
            let Some(line) = line else {
                println!("Goodbye!");
                return Ok(());
            };
            if self.handle(&line).await? == Flow::Quit {
                println!("Goodbye!");
                return Ok(());
            }
        }
    }

    /// Pull fresh state while combat runs, so the prompt names whoever acts now.
    async fn sync(&mut self) {
        if self.session.status != GameStatus::Active || self.session.viewer_id().is_none() {
            return;
        }
        match self.router.refresh(&mut self.session, interrupt()).await {
            Outcome::Applied(_) => {
                if self.session.status == GameStatus::Completed {
                    print_info(&render_winner(&self.session));
                }
            }
            other => debug!(?other, "prompt refresh failed; keeping the last state"),
        }
    }

    async fn handle(&mut self, line: &str) -> anyhow::Result<Flow> {
        let command = match parse(line) {
            Ok(command) => command,
            Err(ParseFailure::Empty) => return Ok(Flow::Continue),
            Err(failure) => {
                debug!(reason = failure.reason(), "parse failure");
                print_error(&failure.to_string());
                return Ok(Flow::Continue);
            }
        };

        match command.verb() {
            Verb::Quit => return Ok(Flow::Quit),
            Verb::Help => print_info(&render_help()),
            Verb::Join
                if command
                    .arg(0)
                    .is_some_and(|choice| choice.eq_ignore_ascii_case("custom")) =>
            {
                self.join_custom(&command).await?;
            }
            Verb::Auto => match self.session.controlled_owner_id.clone() {
                Some(owner) => self.drive(vec![owner]).await,
                None => print_error(&PermissionDenied::NoCharacter.to_string()),
            },
            Verb::Demo => self.demo().await,
            _ => {
                self.step(&command).await;
            }
        }
        Ok(Flow::Continue)
    }

    /// Dispatch one command and render the outcome. True when it was applied.
    async fn step(&mut self, command: &Command) -> bool {
        let before = self.session.status;
        let outcome = self
            .router
            .dispatch(&mut self.session, command, interrupt())
            .await;
        self.show(outcome, before)
    }

    fn show(&self, outcome: Outcome, before: GameStatus) -> bool {
        match outcome {
            Outcome::Applied(report) => {
                print_info(&render_report(&self.session, &report));
                if before != GameStatus::Completed && self.session.status == GameStatus::Completed
                {
                    print_info(&render_winner(&self.session));
                }
                true
            }
            Outcome::Rejected(denied) => {
                print_error(&denied.to_string());
                false
            }
            Outcome::RemoteFailure(err) => {
                print_error(&err.to_string());
                false
            }
            Outcome::Cancelled => {
                print_info("Cancelled.");
                false
            }
        }
    }

    async fn join_custom(&mut self, command: &Command) -> anyhow::Result<()> {
        if let Err(denied) = is_permitted(&self.session, command) {
            print_error(&denied.to_string());
            return Ok(());
        }
        let sheet = self.build_sheet().await?;
        let before = self.session.status;
        let outcome = self
            .router
            .join_with(&mut self.session, sheet, interrupt())
            .await;
        self.show(outcome, before);
        Ok(())
    }

    async fn build_sheet(&mut self) -> anyhow::Result<CharacterSheet> {
        let mut sheet = CharacterSheet::custom();
        print_info("Custom character builder (press Enter to keep the default)");

        sheet.name = self.ask("Name", sheet.name).await?;
        sheet.owner_id = self.ask("Owner ID", sheet.owner_id).await?;

        let mut scores = AbilityScores::default();
        for name in AbilityScores::NAMES {
            if let Some(score) = scores.get_mut(name) {
                *score = self.ask(name, *score).await?;
            }
        }
        sheet.ability_scores = scores;

        sheet.max_hp = self.ask("Max HP", sheet.max_hp).await?;
        sheet.armor_class = self.ask("Armor class", sheet.armor_class).await?;
        sheet.speed = self.ask("Speed (ft)", sheet.speed).await?;

        if let Some(attack) = sheet.attacks.first_mut() {
            attack.name = self.ask("Weapon name", attack.name.clone()).await?;
            attack.attack_bonus = self.ask("Attack bonus", attack.attack_bonus).await?;
            attack.damage_dice = self.ask("Damage dice", attack.damage_dice.clone()).await?;
            attack.damage_bonus = self.ask("Damage bonus", attack.damage_bonus).await?;
            attack.damage_type = self.ask("Damage type", attack.damage_type.clone()).await?;
            attack.reach = self.ask("Reach (ft)", attack.reach).await?;
        }
        Ok(sheet)
    }

    /// Ask for one field. Blank input, end of input or an unparsable answer keep the default.
    async fn ask<T>(&mut self, label: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr + std::fmt::Display,
    {
        show_prompt(&format!("  {label} [{default}]: "))?;
        let Some(line) = self.input.next_line().await? else {
            return Ok(default);
        };
        let answer = line.trim();
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse() {
            Ok(value) => Ok(value),
            Err(_) => {
                print_error(&format!("'{answer}' is not valid here; keeping {default}"));
                Ok(default)
            }
        }
    }

    async fn demo(&mut self) {
        if matches!(
            self.session.status,
            GameStatus::Unset | GameStatus::Completed
        ) && !self.step(&Command::bare(Verb::New)).await
        {
            return;
        }
        if self.session.status == GameStatus::Waiting {
            for preset in ["fighter", "rogue"] {
                if !self
                    .step(&Command::new(Verb::Join, vec![preset.to_string()]))
                    .await
                {
                    return;
                }
            }
            if !self.step(&Command::bare(Verb::Start)).await {
                return;
            }
        }
        let owners: Vec<String> = self.session.roster.keys().cloned().collect();
        self.drive(owners).await;
    }

    async fn drive(&mut self, owners: Vec<String>) {
        let mut ctrl_c = Box::pin(tokio::signal::ctrl_c().fuse());
        let mut stopped = false;

        print_info("Auto-play started. Press Ctrl-C to stop.");
        let outcome = autoplay::run(
            &self.router,
            &mut self.session,
            &owners,
            &self.autoplay,
            || {
                stopped |= matches!(ctrl_c.as_mut().now_or_never(), Some(Ok(())));
                stopped
            },
            |event| print_info(&render_event(&event)),
        )
        .await;

        match outcome {
            AutoplayOutcome::Finished { .. } => print_info(&render_winner(&self.session)),
            AutoplayOutcome::Aborted(AbortReason::Interrupted) => print_info("Auto-play stopped."),
            AutoplayOutcome::Aborted(reason) => print_error(&reason.to_string()),
        }
    }
}
