//! End-to-end dialogue session flows against scripted collaborators.

use async_trait::async_trait;
use rubberduck::agent::AgentGateway;
use rubberduck::agent::service::AgentService;
use rubberduck::conversation::ConversationSession;
use rubberduck::display::{SharedDisplay, StatusSurface};
use rubberduck::error::{DroidError, Result};
use rubberduck::locale::Locale;
use rubberduck::response::NO_SUMMARY;
use rubberduck::session::{DialogueSession, SessionEnd};
use rubberduck::speech::{Recognition, Speech};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Speech double: scripted recognitions, recorded speak calls.
#[derive(Default)]
struct ScriptedSpeech {
    recognitions: Mutex<VecDeque<Recognition>>,
    spoken: Mutex<Vec<(String, Locale)>>,
    fail_synthesis: bool,
}

impl ScriptedSpeech {
    fn with_recognitions(recognitions: Vec<Recognition>) -> Self {
        Self {
            recognitions: Mutex::new(recognitions.into()),
            ..Self::default()
        }
    }

    fn spoken(&self) -> Vec<(String, Locale)> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Speech for ScriptedSpeech {
    async fn recognize_once(&self, _locale: Locale) -> Result<Recognition> {
        Ok(self
            .recognitions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Recognition::NoMatch))
    }

    async fn speak(&self, text: &str, locale: Locale) -> Result<()> {
        self.spoken.lock().unwrap().push((text.to_owned(), locale));
        if self.fail_synthesis {
            return Err(DroidError::Synthesis("voice module unplugged".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AgentCall {
    Reset,
    Query(String),
}

/// Agent double: one canned reply, full call log.
struct ScriptedAgent {
    reply: String,
    calls: Mutex<Vec<AgentCall>>,
}

impl ScriptedAgent {
    fn with_reply(reply: &str) -> Self {
        Self {
            reply: reply.to_owned(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<AgentCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentService for ScriptedAgent {
    async fn validate(&self) -> Result<()> {
        Ok(())
    }

    async fn query(&self, question: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(AgentCall::Query(question.to_owned()));
        Ok(self.reply.clone())
    }

    async fn reset(&self) -> Result<()> {
        self.calls.lock().unwrap().push(AgentCall::Reset);
        Ok(())
    }
}

/// Status double recording every shown line.
#[derive(Default)]
struct RecordingStatus {
    lines: Mutex<Vec<String>>,
}

impl RecordingStatus {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl StatusSurface for RecordingStatus {
    fn show_text(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_owned());
    }

    fn poweroff(&self) {}
}

struct Harness {
    speech: Arc<ScriptedSpeech>,
    agent: Arc<ScriptedAgent>,
    status: Arc<RecordingStatus>,
    dialogue: DialogueSession,
}

fn harness(speech: ScriptedSpeech, agent: ScriptedAgent) -> Harness {
    let speech = Arc::new(speech);
    let agent = Arc::new(agent);
    let status = Arc::new(RecordingStatus::default());
    let gateway = Arc::new(AgentGateway::new(
        Arc::clone(&agent) as Arc<dyn AgentService>
    ));
    let dialogue = DialogueSession::new(
        Arc::clone(&speech) as Arc<dyn Speech>,
        gateway,
        SharedDisplay::new(),
        Arc::clone(&status) as Arc<dyn StatusSurface>,
    );
    Harness {
        speech,
        agent,
        status,
        dialogue,
    }
}

#[tokio::test]
async fn capital_of_finland_round_trip() {
    let h = harness(
        ScriptedSpeech::with_recognitions(vec![
            Recognition::Recognized("What is the capital of Finland?".into()),
            Recognition::NoMatch,
        ]),
        ScriptedAgent::with_reply("Helsinki, of course.\n\nSummary: Helsinki"),
    );

    let mut session = ConversationSession::new(Locale::English);
    let end = h.dialogue.run(&mut session).await.unwrap();

    // One turn, then the empty recognition closes the session.
    assert_eq!(end, SessionEnd::Silence);
    assert_eq!(
        h.agent.calls(),
        vec![AgentCall::Query("What is the capital of Finland?".into())]
    );
    // The marker split drives what is spoken, with the English voice.
    assert_eq!(
        h.speech.spoken(),
        vec![("Helsinki, of course.\n\n".to_owned(), Locale::English)]
    );
    // The summary lands on the status screen.
    assert!(h.status.lines().contains(&"Helsinki".to_owned()));
}

#[tokio::test]
async fn empty_recognition_ends_with_zero_agent_calls() {
    let h = harness(
        ScriptedSpeech::with_recognitions(vec![Recognition::Recognized(String::new())]),
        ScriptedAgent::with_reply("unused"),
    );

    let mut session = ConversationSession::new(Locale::English);
    let end = h.dialogue.run(&mut session).await.unwrap();

    assert_eq!(end, SessionEnd::Silence);
    assert!(h.agent.calls().is_empty());
    assert!(h.speech.spoken().is_empty());
}

#[tokio::test]
async fn cancelled_recognition_behaves_like_no_match() {
    let h = harness(
        ScriptedSpeech::with_recognitions(vec![Recognition::Cancelled(
            "recognizer returned 500".into(),
        )]),
        ScriptedAgent::with_reply("unused"),
    );

    let mut session = ConversationSession::new(Locale::Finnish);
    let end = h.dialogue.run(&mut session).await.unwrap();

    assert_eq!(end, SessionEnd::Silence);
    assert!(h.agent.calls().is_empty());
}

#[tokio::test]
async fn exit_command_ends_session_and_requests_shutdown() {
    let h = harness(
        ScriptedSpeech::with_recognitions(vec![Recognition::Recognized("exit please".into())]),
        ScriptedAgent::with_reply("unused"),
    );

    let mut session = ConversationSession::new(Locale::English);
    let end = h.dialogue.run(&mut session).await.unwrap();

    assert_eq!(end, SessionEnd::Exit);
    assert!(h.agent.calls().is_empty());
    assert!(h.speech.spoken().is_empty());
}

#[tokio::test]
async fn long_idle_gap_resets_memory_before_query() {
    let h = harness(
        ScriptedSpeech::with_recognitions(vec![
            Recognition::Recognized("Still there?".into()),
            Recognition::NoMatch,
        ]),
        ScriptedAgent::with_reply("Yes.\n\nSummary: yes"),
    );

    // A session whose last activity was 901 seconds ago.
    let mut session = ConversationSession::with_last_activity(
        Locale::English,
        Instant::now() - Duration::from_secs(901),
    );
    h.dialogue.run(&mut session).await.unwrap();

    assert_eq!(
        h.agent.calls(),
        vec![AgentCall::Reset, AgentCall::Query("Still there?".into())]
    );
}

#[tokio::test]
async fn short_idle_gap_skips_reset() {
    let h = harness(
        ScriptedSpeech::with_recognitions(vec![
            Recognition::Recognized("Still there?".into()),
            Recognition::NoMatch,
        ]),
        ScriptedAgent::with_reply("Yes.\n\nSummary: yes"),
    );

    let mut session = ConversationSession::with_last_activity(
        Locale::English,
        Instant::now() - Duration::from_secs(899),
    );
    h.dialogue.run(&mut session).await.unwrap();

    assert_eq!(
        h.agent.calls(),
        vec![AgentCall::Query("Still there?".into())]
    );
}

#[tokio::test]
async fn synthesis_failure_does_not_end_the_session() {
    let speech = ScriptedSpeech {
        recognitions: Mutex::new(
            vec![
                Recognition::Recognized("first".into()),
                Recognition::Recognized("second".into()),
                Recognition::NoMatch,
            ]
            .into(),
        ),
        fail_synthesis: true,
        ..ScriptedSpeech::default()
    };
    let h = harness(speech, ScriptedAgent::with_reply("Fine.\n\nSummary: fine"));

    let mut session = ConversationSession::new(Locale::English);
    let end = h.dialogue.run(&mut session).await.unwrap();

    // Both turns reached the agent despite the broken voice.
    assert_eq!(end, SessionEnd::Silence);
    assert_eq!(h.agent.calls().len(), 2);
    assert_eq!(h.speech.spoken().len(), 2);
}

#[tokio::test]
async fn markerless_reply_shows_sentinel_summary() {
    let h = harness(
        ScriptedSpeech::with_recognitions(vec![
            Recognition::Recognized("hello".into()),
            Recognition::NoMatch,
        ]),
        ScriptedAgent::with_reply("Just a plain answer."),
    );

    let mut session = ConversationSession::new(Locale::English);
    h.dialogue.run(&mut session).await.unwrap();

    assert!(h.status.lines().contains(&NO_SUMMARY.to_owned()));
    assert_eq!(
        h.speech.spoken(),
        vec![("Just a plain answer.".to_owned(), Locale::English)]
    );
}

#[tokio::test]
async fn finnish_session_speaks_with_finnish_voice() {
    let h = harness(
        ScriptedSpeech::with_recognitions(vec![
            Recognition::Recognized("Mikä on Suomen pääkaupunki?".into()),
            Recognition::NoMatch,
        ]),
        ScriptedAgent::with_reply("Helsinki tietenkin.\n\nYhteenveto: Helsinki"),
    );

    let mut session = ConversationSession::new(Locale::Finnish);
    h.dialogue.run(&mut session).await.unwrap();

    let spoken = h.speech.spoken();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].1, Locale::Finnish);
    assert_eq!(spoken[0].0, "Helsinki tietenkin.\n\n");
}
