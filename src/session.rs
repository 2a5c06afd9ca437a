use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::emit_output;
use crate::{ContainerOutput, Mailbox, PollOutcome, ReasoningEngine};

pub(crate) const SCHEDULED_TASK_MARKER: &str = "[Scheduled task]";

/// Prefix the initial prompt with the scheduled-task marker. Applied once,
/// before the first submission; later mailbox turns are never scheduled.
pub(crate) fn scheduled_prompt(prompt: &str, is_scheduled: bool) -> String {
    if is_scheduled {
        format!("{SCHEDULED_TASK_MARKER} {prompt}")
    } else {
        prompt.to_string()
    }
}

/// Mint a fresh session identifier. Uniqueness only has to hold across
/// worker launches for the same conversation, so a timestamp pair is
/// plenty.
pub(crate) fn mint_session_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("sess_{}_{:06}", now.as_secs(), now.subsec_micros())
}

/// Owns the engine handle and the session identity. Alternates between
/// Active (one turn in flight) and Idle (waiting on the mailbox); exactly
/// one turn executes at a time.
pub(crate) struct SessionController<E: ReasoningEngine> {
    engine: E,
    session_id: String,
    turn: usize,
}

impl<E: ReasoningEngine> SessionController<E> {
    pub(crate) fn new(engine: E, session_id: Option<String>) -> Self {
        let session_id = session_id.unwrap_or_else(mint_session_id);
        SessionController {
            engine,
            session_id,
            turn: 0,
        }
    }

    pub(crate) fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Submit one user turn and fully consume its event sequence. Text
    /// fragments accumulate in arrival order; action notices go to stderr
    /// only, never into the result.
    pub(crate) fn run_turn(&mut self, text: &str) -> Result<String, String> {
        self.turn += 1;
        eprintln!(
            "[turn {}] submitting {} chars to session {}",
            self.turn,
            text.chars().count(),
            self.session_id
        );
        let events = self.engine.submit_turn(&self.session_id, text)?;

        let mut accumulated = String::new();
        for event in &events {
            if let Some(ref fragment) = event.text {
                if !fragment.is_empty() {
                    if !accumulated.is_empty() {
                        accumulated.push('\n');
                    }
                    accumulated.push_str(fragment);
                }
            }
            for action in &event.actions {
                eprintln!("[action] {} {}", action.tool, action.detail);
            }
        }
        eprintln!(
            "[turn {}] complete, {} event(s), {} chars",
            self.turn,
            events.len(),
            accumulated.chars().count()
        );
        Ok(accumulated)
    }

    /// The Active/Idle loop: run a turn, frame its output, then block on
    /// the mailbox for the next input or the close sentinel. Any turn
    /// failure is framed as an error block and ends the process; the host
    /// decides whether to relaunch.
    pub(crate) fn run_loop(
        &mut self,
        initial_prompt: String,
        mailbox: &Mailbox,
        out: &mut impl Write,
    ) -> Result<(), String> {
        let mut input = initial_prompt;
        loop {
            match self.run_turn(&input) {
                Ok(text) => {
                    let output = ContainerOutput::success(text, &self.session_id);
                    emit_output(out, &output)?;
                }
                Err(err) => {
                    eprintln!("[session] fatal turn error: {err}");
                    let output = ContainerOutput::error(err.clone());
                    if let Err(emit_err) = emit_output(out, &output) {
                        eprintln!("[session] {emit_err}");
                    }
                    return Err(err);
                }
            }
            match mailbox.wait_for_input() {
                PollOutcome::Input(text) => input = text,
                PollOutcome::Closed => {
                    eprintln!("[session] close sentinel observed, exiting");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{OUTPUT_END_MARKER, OUTPUT_START_MARKER};
    use crate::{ActionNotice, TurnEvent};
    use std::collections::VecDeque;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    /// Engine stand-in that replays canned event sequences and records
    /// what was submitted to it.
    struct ScriptedEngine {
        responses: VecDeque<Result<Vec<TurnEvent>, String>>,
        seen: Vec<(String, String)>,
    }

    impl ScriptedEngine {
        fn new(responses: Vec<Result<Vec<TurnEvent>, String>>) -> Self {
            ScriptedEngine {
                responses: responses.into(),
                seen: Vec::new(),
            }
        }
    }

    impl ReasoningEngine for ScriptedEngine {
        fn submit_turn(&mut self, session_id: &str, text: &str) -> Result<Vec<TurnEvent>, String> {
            self.seen.push((session_id.to_string(), text.to_string()));
            self.responses
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn text_event(text: &str) -> TurnEvent {
        TurnEvent {
            text: Some(text.to_string()),
            actions: Vec::new(),
        }
    }

    fn temp_mailbox(tag: &str) -> (Mailbox, PathBuf) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("agentcell-sess-{tag}-{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        let sentinel = dir.join("close");
        (
            Mailbox::new(dir.clone(), sentinel, Duration::from_millis(5)),
            dir,
        )
    }

    #[test]
    fn fragments_accumulate_in_arrival_order() {
        let engine = ScriptedEngine::new(vec![Ok(vec![
            text_event("first"),
            TurnEvent {
                text: None,
                actions: vec![ActionNotice {
                    tool: "exec".to_string(),
                    detail: "ok: done".to_string(),
                    is_error: false,
                }],
            },
            text_event("second"),
        ])]);
        let mut controller = SessionController::new(engine, None);
        let result = controller.run_turn("go").unwrap();
        assert_eq!(result, "first\nsecond");
    }

    #[test]
    fn minted_session_id_is_stable_across_turns() {
        let engine = ScriptedEngine::new(vec![Ok(vec![text_event("a")]), Ok(vec![text_event("b")])]);
        let mut controller = SessionController::new(engine, None);
        let id = controller.session_id().to_string();
        assert!(id.starts_with("sess_"));
        controller.run_turn("one").unwrap();
        controller.run_turn("two").unwrap();
        assert_eq!(controller.session_id(), id);
        assert_eq!(controller.engine.seen[0].0, id);
        assert_eq!(controller.engine.seen[1].0, id);
    }

    #[test]
    fn supplied_session_id_is_kept() {
        let engine = ScriptedEngine::new(vec![]);
        let controller = SessionController::new(engine, Some("sess_given".to_string()));
        assert_eq!(controller.session_id(), "sess_given");
    }

    #[test]
    fn engine_errors_propagate() {
        let engine = ScriptedEngine::new(vec![Err("stream broke".to_string())]);
        let mut controller = SessionController::new(engine, None);
        assert_eq!(controller.run_turn("go"), Err("stream broke".to_string()));
    }

    #[test]
    fn scheduled_marker_applied_exactly_once() {
        let prompt = scheduled_prompt("water the plants", true);
        assert_eq!(prompt, "[Scheduled task] water the plants");
        assert_eq!(prompt.matches(SCHEDULED_TASK_MARKER).count(), 1);
        assert_eq!(scheduled_prompt("hi", false), "hi");
    }

    #[test]
    fn loop_frames_one_block_then_exits_on_sentinel() {
        let engine = ScriptedEngine::new(vec![Ok(vec![text_event("reply")])]);
        let mut controller = SessionController::new(engine, Some("sess_x".to_string()));
        let (mailbox, dir) = temp_mailbox("close");
        fs::write(dir.join("close"), "").unwrap();

        let mut out: Vec<u8> = Vec::new();
        controller
            .run_loop("hello".to_string(), &mailbox, &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches(OUTPUT_START_MARKER).count(), 1);
        assert_eq!(text.matches(OUTPUT_END_MARKER).count(), 1);
        let json_line = text.lines().nth(1).unwrap();
        let parsed: ContainerOutput = serde_json::from_str(json_line).unwrap();
        assert_eq!(parsed.status, "success");
        assert_eq!(parsed.result.as_deref(), Some("reply"));
        assert_eq!(parsed.new_session_id.as_deref(), Some("sess_x"));
    }

    #[test]
    fn loop_runs_mailbox_turn_before_close() {
        let engine = ScriptedEngine::new(vec![
            Ok(vec![text_event("turn one")]),
            Ok(vec![text_event("turn two")]),
        ]);
        let mut controller = SessionController::new(engine, Some("sess_y".to_string()));
        let (mailbox, dir) = temp_mailbox("two-turns");
        fs::write(
            dir.join("msg-001.json"),
            r#"{"type":"message","text":"follow-up"}"#,
        )
        .unwrap();
        // Drop the sentinel once the follow-up has had time to drain.
        let sentinel = dir.join("close");
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            fs::write(sentinel, "").unwrap();
        });

        let mut out: Vec<u8> = Vec::new();
        controller
            .run_loop("hello".to_string(), &mailbox, &mut out)
            .unwrap();
        writer.join().unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches(OUTPUT_START_MARKER).count(), 2);
        assert_eq!(controller.engine.seen.len(), 2);
        assert_eq!(controller.engine.seen[1].1, "follow-up");
    }

    #[test]
    fn loop_frames_error_block_on_fatal_turn() {
        let engine = ScriptedEngine::new(vec![Err("engine gone".to_string())]);
        let mut controller = SessionController::new(engine, None);
        let (mailbox, _dir) = temp_mailbox("fatal");

        let mut out: Vec<u8> = Vec::new();
        let result = controller.run_loop("hello".to_string(), &mailbox, &mut out);
        assert!(result.is_err());

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches(OUTPUT_START_MARKER).count(), 1);
        let parsed: ContainerOutput =
            serde_json::from_str(text.lines().nth(1).unwrap()).unwrap();
        assert_eq!(parsed.status, "error");
        assert_eq!(parsed.error.as_deref(), Some("engine gone"));
        assert!(parsed.result.is_none());
    }

    #[test]
    fn minted_ids_differ() {
        // Microsecond component makes back-to-back mints distinct.
        let a = mint_session_id();
        std::thread::sleep(Duration::from_millis(2));
        let b = mint_session_id();
        assert_ne!(a, b);
    }
}
