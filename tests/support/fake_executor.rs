// ABOUTME: A scripted Executor for exercising stages without a network.
// ABOUTME: Matches commands by substring and records everything that ran.

use apostoli::ssh::{CommandOutput, Error, Executor, RemoteCommand, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

struct Rule {
    pattern: String,
    responses: VecDeque<CommandOutput>,
    /// Replayed once the queue is exhausted.
    last: CommandOutput,
}

/// Scripted fake: commands whose script contains a registered pattern
/// get the scripted response; everything else succeeds with no output.
#[derive(Default)]
pub struct FakeExecutor {
    rules: Mutex<Vec<Rule>>,
    log: Mutex<Vec<String>>,
    fail_all: Mutex<Option<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every matching command gets the same response.
    pub fn respond(&self, pattern: &str, exit_code: u32, stdout: &str) {
        let output = make_output(exit_code, stdout);
        self.rules.lock().push(Rule {
            pattern: pattern.to_string(),
            responses: VecDeque::new(),
            last: output,
        });
    }

    /// Matching commands consume responses in order; the final one
    /// repeats once the queue is exhausted.
    pub fn respond_seq(&self, pattern: &str, responses: &[(u32, &str)]) {
        assert!(!responses.is_empty(), "need at least one response");
        let mut queue: VecDeque<CommandOutput> = responses
            .iter()
            .map(|(code, out)| make_output(*code, out))
            .collect();
        let last = queue.back().cloned().unwrap();
        queue.pop_back();
        self.rules.lock().push(Rule {
            pattern: pattern.to_string(),
            responses: queue,
            last,
        });
    }

    /// Simulate a dead channel: every command errors.
    pub fn fail_connection(&self, message: &str) {
        *self.fail_all.lock() = Some(message.to_string());
    }

    /// Every script that was executed, in order.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.log.lock().iter().any(|c| c.contains(pattern))
    }

    /// Index of the first executed command containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.log.lock().iter().position(|c| c.contains(pattern))
    }
}

fn make_output(exit_code: u32, stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput> {
        self.log.lock().push(command.script().to_string());

        if let Some(message) = self.fail_all.lock().clone() {
            return Err(Error::Connection(message));
        }

        let mut rules = self.rules.lock();
        for rule in rules.iter_mut() {
            if command.script().contains(&rule.pattern) {
                return Ok(rule.responses.pop_front().unwrap_or_else(|| rule.last.clone()));
            }
        }
        Ok(make_output(0, ""))
    }
}
