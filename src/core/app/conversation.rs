use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::errors::user_message;
use super::{SessionContext, Submission, SubmitError, TranscriptEvent, TurnPhase};
use crate::core::cases::{build_case_context, CaseError, CaseRecord};
use crate::core::chat_stream::{ModelRequest, StreamError};
use crate::core::constants::{ACTION_PROMPT_PREFIX, GREETING};
use crate::core::geolocation::locate_with_timeout;
use crate::core::message::{Content, ConversationTurn, TurnId};
use crate::core::response;

/// Turns pushed by a `submit` that has not finished yet.
#[derive(Debug, Clone, Copy)]
struct PendingTurn {
    user: TurnId,
    reply: TurnId,
}

/// Owns the transcript and drives one turn at a time through
/// `Submitting -> Streaming -> Enriching`.
///
/// `submit` borrows the controller mutably, so turns never overlap. A
/// non-idle phase on entry means the previous `submit` future was dropped
/// mid-turn; its turns are rolled back before anything else happens.
pub struct ConversationController {
    session: SessionContext,
    transcript: Vec<ConversationTurn>,
    next_id: u64,
    phase: TurnPhase,
    pending: Option<PendingTurn>,
    last_error: Option<String>,
    case: Option<CaseRecord>,
    events: Option<mpsc::UnboundedSender<TranscriptEvent>>,
}

impl ConversationController {
    pub fn new(session: SessionContext) -> Self {
        Self {
            session,
            transcript: vec![ConversationTurn::greeting(TurnId(0), GREETING)],
            next_id: 1,
            phase: TurnPhase::Idle,
            pending: None,
            last_error: None,
            case: None,
            events: None,
        }
    }

    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn case(&self) -> Option<&CaseRecord> {
        self.case.as_ref()
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn turn(&self, id: TurnId) -> Option<&ConversationTurn> {
        self.transcript.iter().find(|turn| turn.id == id)
    }

    /// The most recent model turn that carries content.
    pub fn last_reply(&self) -> Option<&ConversationTurn> {
        self.transcript
            .iter()
            .rev()
            .find(|turn| turn.is_model() && !turn.local_only && turn.has_content())
    }

    /// Receive every subsequent transcript change. Replaces any earlier
    /// subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TranscriptEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&mut self, event: TranscriptEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                debug!("transcript subscriber dropped");
                self.events = None;
            }
        }
    }

    fn set_phase(&mut self, phase: TurnPhase) {
        if self.phase != phase {
            self.phase = phase;
            self.emit(TranscriptEvent::PhaseChanged(phase));
        }
    }

    fn allocate_id(&mut self) -> TurnId {
        let id = TurnId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Follow-up prompt sent when the user picks a suggested action.
    pub fn action_prompt(action: &str) -> String {
        format!("{ACTION_PROMPT_PREFIX}{}", action.trim())
    }

    /// Roll back a turn whose `submit` future was dropped, the same way a
    /// failed stream is rolled back.
    fn recover_abandoned_turn(&mut self) {
        if !self.phase.is_busy() {
            return;
        }
        if let Some(pending) = self.pending.take() {
            let partial = self
                .turn(pending.reply)
                .is_some_and(ConversationTurn::has_content);
            warn!(partial, "rolling back an abandoned turn");
            self.remove_turn(pending.reply);
            if partial {
                self.log_stored_turn(pending.user);
            } else {
                self.remove_turn(pending.user);
            }
            self.persist_case();
        }
        self.set_phase(TurnPhase::Idle);
    }

    /// Drop everything but the greeting. The attached case is detached, not
    /// deleted.
    pub fn reset(&mut self) {
        self.recover_abandoned_turn();
        self.transcript = vec![ConversationTurn::greeting(TurnId(0), GREETING)];
        self.next_id = 1;
        self.last_error = None;
        self.case = None;
        self.emit(TranscriptEvent::Reset);
    }

    /// Continue `case`: its stored turns follow the greeting.
    pub fn resume_case(&mut self, case: CaseRecord) {
        self.reset();
        let stored = case.messages.iter().filter(|turn| !turn.local_only).cloned();
        self.transcript.extend(stored);
        self.next_id = self
            .transcript
            .iter()
            .map(|turn| turn.id.0 + 1)
            .max()
            .unwrap_or(1);
        self.case = Some(case);
    }

    /// Create a fresh case through the attached case service and switch to it.
    pub fn start_case(&mut self, name: Option<&str>) -> Result<Option<&CaseRecord>, CaseError> {
        let Some(cases) = self.session.cases.clone() else {
            return Ok(None);
        };
        let case = cases.create_case(name)?;
        self.resume_case(case);
        Ok(self.case.as_ref())
    }

    fn system_instruction(&self) -> String {
        let context = self
            .case
            .as_ref()
            .map(build_case_context)
            .unwrap_or_default();
        if context.is_empty() {
            self.session.system_instruction.clone()
        } else {
            format!("{context}\n\n{}", self.session.system_instruction)
        }
    }

    /// History sent upstream: local-only and empty turns are dropped, as is
    /// the placeholder being streamed into.
    fn history(&self, placeholder: TurnId) -> Vec<Content> {
        self.transcript
            .iter()
            .filter(|turn| turn.id != placeholder)
            .filter_map(Content::from_turn)
            .collect()
    }

    /// Store the transcript in the attached case. Local-only turns and turns
    /// without content are left out.
    fn persist_case(&mut self) {
        let (Some(cases), Some(case)) = (self.session.cases.as_ref(), self.case.as_mut()) else {
            return;
        };
        case.messages = self
            .transcript
            .iter()
            .filter(|turn| !turn.local_only && turn.has_content())
            .cloned()
            .collect();
        if let Err(e) = cases.save_current_case(case) {
            error!("failed to save case {}: {e}", case.id);
            let message = format!("Could not save case: {e}");
            self.emit(TranscriptEvent::Error(message));
        }
    }

    fn log_turn(&self, turn: &ConversationTurn) {
        if let Err(e) = self.session.logging.log_turn(turn) {
            warn!("failed to write transcript log: {e}");
        }
    }

    /// Log `id` if it is still in the transcript.
    fn log_stored_turn(&self, id: TurnId) {
        if let Some(turn) = self.turn(id) {
            self.log_turn(turn);
        }
    }

    fn push_turn(&mut self, turn: ConversationTurn) {
        self.transcript.push(turn.clone());
        self.emit(TranscriptEvent::TurnAdded(turn));
    }

    fn remove_turn(&mut self, id: TurnId) {
        if let Some(pos) = self.transcript.iter().position(|turn| turn.id == id) {
            self.transcript.remove(pos);
            self.emit(TranscriptEvent::TurnRemoved(id));
        }
    }

    /// Send one user turn and stream the reply into the transcript.
    ///
    /// Returns the id of the completed model turn. On failure the turn is
    /// rolled back and the user-facing message is returned. The user turn
    /// reaches the transcript log only once it is known to stay.
    pub async fn submit(&mut self, submission: Submission) -> Result<TurnId, SubmitError> {
        self.recover_abandoned_turn();
        let text = submission.text.trim().to_string();
        if text.is_empty() && submission.file.is_none() {
            return Err(SubmitError::Empty);
        }

        self.last_error = None;
        self.set_phase(TurnPhase::Submitting);
        let system_instruction = self.system_instruction();

        let location = match &self.session.location {
            Some(provider) => {
                locate_with_timeout(provider.as_ref(), self.session.location_timeout).await
            }
            None => None,
        };

        let user_id = self.allocate_id();
        let mut user_turn = ConversationTurn::user(user_id, text);
        user_turn.file = submission.file.map(|file| file.into_attachment());
        user_turn.timestamp = Some(Utc::now());
        user_turn.location = location;
        self.push_turn(user_turn);
        self.persist_case();

        let reply_id = self.allocate_id();
        self.push_turn(ConversationTurn::model(reply_id, ""));
        self.pending = Some(PendingTurn {
            user: user_id,
            reply: reply_id,
        });

        let request = ModelRequest {
            system_instruction,
            history: self.history(reply_id),
        };

        self.set_phase(TurnPhase::Streaming);
        let outcome = self.stream_reply(reply_id, request).await;

        let result = match outcome {
            Ok(buffer) => {
                self.log_stored_turn(user_id);
                if !buffer.is_empty() {
                    self.set_phase(TurnPhase::Enriching);
                    self.enrich_reply(reply_id, &buffer);
                }
                Ok(reply_id)
            }
            Err((err, fragments)) => {
                self.set_phase(TurnPhase::Failed);
                let message = user_message(&err);
                warn!(fragments, "turn failed: {err}");
                self.remove_turn(reply_id);
                if fragments == 0 {
                    self.remove_turn(user_id);
                }
                self.log_stored_turn(user_id);
                self.last_error = Some(message.clone());
                self.emit(TranscriptEvent::Error(message.clone()));
                Err(SubmitError::Failed(message))
            }
        };

        self.pending = None;
        self.persist_case();
        self.set_phase(TurnPhase::Idle);
        result
    }

    /// Submit the follow-up prompt for a suggested action.
    pub async fn submit_action(&mut self, action: &str) -> Result<TurnId, SubmitError> {
        self.submit(Submission::text(Self::action_prompt(action)))
            .await
    }

    async fn stream_reply(
        &mut self,
        reply_id: TurnId,
        request: ModelRequest,
    ) -> Result<String, (StreamError, usize)> {
        let client = Arc::clone(&self.session.client);
        let mut fragments = client.stream(request).await.map_err(|e| (e, 0))?;

        let mut buffer = String::new();
        let mut received = 0usize;
        while let Some(item) = fragments.next().await {
            let fragment = item.map_err(|e| (e, received))?;
            received += 1;
            buffer.push_str(&fragment);
            if let Some(turn) = self.transcript.iter_mut().find(|t| t.id == reply_id) {
                turn.text.clone_from(&buffer);
            }
            self.emit(TranscriptEvent::TurnUpdated {
                id: reply_id,
                text: buffer.clone(),
            });
        }
        debug!(fragments = received, bytes = buffer.len(), "reply complete");
        Ok(buffer)
    }

    fn enrich_reply(&mut self, reply_id: TurnId, text: &str) {
        let enrichment = response::enrich(text);
        let Some(turn) = self.transcript.iter_mut().find(|t| t.id == reply_id) else {
            return;
        };
        turn.seal = Some(enrichment.seal);
        turn.actions = (!enrichment.actions.is_empty()).then_some(enrichment.actions);
        turn.is_document = enrichment.document.is_document;
        turn.document_body = enrichment.document.body;
        turn.timestamp = Some(Utc::now());

        let turn = turn.clone();
        self.log_turn(&turn);
        self.emit(TranscriptEvent::TurnEnriched(turn));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::FileUpload;
    use crate::core::cases::CaseService;
    use crate::core::chat_stream::StreamError;
    use crate::core::geolocation::StaticLocation;
    use crate::core::hashing;
    use crate::core::message::Part;
    use crate::utils::logging::TranscriptLog;
    use crate::utils::test_utils::{controller_with, ScriptedClient};
    use std::time::Duration;
    use tempfile::TempDir;

    fn controller_with_case(
        client: ScriptedClient,
        cases: &CaseService,
    ) -> ConversationController {
        let mut controller = ConversationController::new(
            SessionContext::new(Arc::new(client)).with_cases(cases.clone()),
        );
        controller.start_case(Some("Matter")).expect("case");
        controller
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TranscriptEvent>) -> Vec<TranscriptEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn fragments_are_observed_cumulatively() {
        let client = ScriptedClient::fragments(["Hel", "lo"]);
        let mut controller = controller_with(client.clone());
        let mut rx = controller.subscribe();

        let reply_id = controller
            .submit(Submission::text("Hi"))
            .await
            .expect("submit");

        let updates: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                TranscriptEvent::TurnUpdated { id, text } if id == reply_id => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec!["Hel".to_string(), "Hello".to_string()]);

        let reply = controller.turn(reply_id).expect("reply");
        assert_eq!(reply.text, "Hello");
        assert_eq!(reply.seal.as_deref(), Some(hashing::digest_str("Hello").as_str()));
        assert_eq!(controller.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn phases_are_reported_in_order() {
        let mut controller = controller_with(ScriptedClient::fragments(["ok"]));
        let mut rx = controller.subscribe();
        controller.submit(Submission::text("Hi")).await.expect("submit");

        let phases: Vec<TurnPhase> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                TranscriptEvent::PhaseChanged(phase) => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                TurnPhase::Submitting,
                TurnPhase::Streaming,
                TurnPhase::Enriching,
                TurnPhase::Idle
            ]
        );
    }

    #[tokio::test]
    async fn history_skips_greeting_and_placeholder() {
        let client = ScriptedClient::fragments(["First answer"]);
        let mut controller = controller_with(client.clone());
        controller.submit(Submission::text("one")).await.expect("first");
        controller.submit(Submission::text("two")).await.expect("second");

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].history.len(), 1);
        let roles: Vec<_> = requests[1].history.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(requests[1].history[2].parts, vec![Part::Text("two".into())]);
    }

    #[tokio::test]
    async fn failure_before_any_fragment_removes_both_turns() {
        let client = ScriptedClient::failing(
            Vec::<&str>::new(),
            StreamError::Transport("connection refused".into()),
        );
        let mut controller = controller_with(client);
        let before = controller.transcript().len();

        let err = controller
            .submit(Submission::text("Hello?"))
            .await
            .unwrap_err();

        assert_eq!(err, SubmitError::Failed("connection refused".into()));
        assert_eq!(controller.transcript().len(), before);
        assert_eq!(controller.last_error(), Some("connection refused"));
        assert_eq!(controller.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn failure_after_fragments_keeps_user_turn() {
        let client = ScriptedClient::failing(
            ["partial"],
            StreamError::Provider("API key not valid".into()),
        );
        let mut controller = controller_with(client);
        let before = controller.transcript().len();

        let err = controller
            .submit(Submission::text("Hello?"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Failed(msg) if msg.contains("not valid")));
        assert_eq!(controller.transcript().len(), before + 1);
        let last = controller.transcript().last().unwrap();
        assert!(last.is_user());
        assert_eq!(last.text, "Hello?");
    }

    #[tokio::test]
    async fn empty_submission_is_rejected() {
        let mut controller = controller_with(ScriptedClient::fragments(["x"]));
        assert_eq!(
            controller.submit(Submission::text("   ")).await,
            Err(SubmitError::Empty)
        );
        assert_eq!(controller.transcript().len(), 1);
    }

    #[tokio::test]
    async fn file_only_submission_is_sealed_and_sent_inline() {
        let client = ScriptedClient::fragments(["Received"]);
        let mut controller = controller_with(client.clone());
        let upload = FileUpload {
            name: "scan.png".into(),
            mime_type: "image/png".into(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        };
        controller
            .submit(Submission::default().with_file(upload))
            .await
            .expect("submit");

        let user = &controller.transcript()[1];
        let file = user.file.as_ref().expect("attachment");
        assert_eq!(file.seal.digest, hashing::digest_str(&file.data));
        assert!(user.timestamp.is_some());

        let sent = &client.requests()[0].history[0];
        assert_eq!(
            sent.parts,
            vec![Part::InlineData {
                mime_type: "image/png".into(),
                data: file.data.clone()
            }]
        );
    }

    #[tokio::test]
    async fn actions_and_document_are_attached() {
        let reply = "Findings.\n* **Step A:** Submit the form immediately.\n\
                     [START OF DOCUMENT]\n# Title\n[END OF DOCUMENT]";
        let mut controller = controller_with(ScriptedClient::fragments([reply]));
        let id = controller.submit(Submission::text("go")).await.expect("submit");

        let turn = controller.turn(id).unwrap();
        assert_eq!(turn.actions.as_deref(), Some(&["Submit the form".to_string()][..]));
        assert!(turn.is_document);
        assert_eq!(turn.document_body.as_deref(), Some("# Title"));
    }

    #[tokio::test]
    async fn action_prompt_uses_fixed_prefix() {
        assert_eq!(
            ConversationController::action_prompt(" Submit the form "),
            "Based on your analysis, please: Submit the form"
        );
        let client = ScriptedClient::fragments(["ok"]);
        let mut controller = controller_with(client.clone());
        controller.submit_action("File the complaint").await.expect("submit");
        assert_eq!(
            client.requests()[0].history[0].parts,
            vec![Part::Text("Based on your analysis, please: File the complaint".into())]
        );
    }

    #[tokio::test]
    async fn reset_restores_greeting() {
        let mut controller = controller_with(ScriptedClient::fragments(["ok"]));
        controller.submit(Submission::text("hi")).await.expect("submit");
        assert_eq!(controller.transcript().len(), 3);

        controller.reset();
        assert_eq!(controller.transcript().len(), 1);
        assert!(controller.transcript()[0].local_only);
        assert_eq!(controller.transcript()[0].text, GREETING);
    }

    #[tokio::test]
    async fn case_is_saved_and_context_prepended() {
        let client = ScriptedClient::fragments(["Noted."]);
        let cases = CaseService::in_memory();
        let mut controller = ConversationController::new(
            SessionContext::new(Arc::new(client.clone())).with_cases(cases.clone()),
        );
        controller.start_case(Some("Audit")).expect("case");

        controller.submit(Submission::text("first")).await.expect("first");
        let stored = cases.current_case().expect("current case");
        assert_eq!(stored.name, "Audit");
        assert_eq!(stored.messages.len(), 2);
        assert!(stored.messages.iter().all(|turn| !turn.local_only));

        controller.submit(Submission::text("second")).await.expect("second");
        let requests = client.requests();
        assert!(!requests[0].system_instruction.starts_with("ONGOING CASE CONTEXT"));
        assert!(requests[1]
            .system_instruction
            .starts_with("ONGOING CASE CONTEXT:\nCase Name: Audit"));
        assert_eq!(cases.current_case().unwrap().messages.len(), 4);
    }

    #[tokio::test]
    async fn resumed_case_continues_ids() {
        let cases = CaseService::in_memory();
        let mut case = cases.create_case(Some("Old")).expect("case");
        case.messages = vec![
            ConversationTurn::user(TurnId(1), "q"),
            ConversationTurn::model(TurnId(2), "a"),
        ];
        cases.save_current_case(&mut case).expect("save");

        let mut controller = ConversationController::new(
            SessionContext::new(Arc::new(ScriptedClient::fragments(["b"]))).with_cases(cases),
        );
        controller.resume_case(case);
        let id = controller.submit(Submission::text("q2")).await.expect("submit");
        assert_eq!(id, TurnId(4));
        assert_eq!(controller.transcript().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn user_turn_carries_location() {
        let session = SessionContext::new(Arc::new(ScriptedClient::fragments(["ok"])))
            .with_location(
                Arc::new(StaticLocation {
                    latitude: 1.0,
                    longitude: 2.0,
                    accuracy: 3.0,
                }),
                Duration::from_secs(8),
            );
        let mut controller = ConversationController::new(session);
        controller.submit(Submission::text("where")).await.expect("submit");
        let location = controller.transcript()[1].location.as_ref().expect("location");
        assert_eq!(location.latitude, 1.0);
    }

    #[tokio::test]
    async fn failed_turn_leaves_case_without_user_turn() {
        let cases = CaseService::in_memory();
        let client = ScriptedClient::failing(
            Vec::<&str>::new(),
            StreamError::Transport("connection reset".into()),
        );
        let mut controller = controller_with_case(client, &cases);

        controller
            .submit(Submission::text("Is the signature forged?"))
            .await
            .unwrap_err();

        assert!(cases.current_case().expect("current").messages.is_empty());
        assert!(cases.all_cases()[0].messages.is_empty());
    }

    #[tokio::test]
    async fn empty_reply_is_not_stored_or_used_as_context() {
        let cases = CaseService::in_memory();
        let client = ScriptedClient::fragments(Vec::<&str>::new());
        let mut controller = controller_with_case(client.clone(), &cases);

        controller.submit(Submission::text("first")).await.expect("first");
        // The empty reply stays on screen but not in the case.
        assert_eq!(controller.transcript().len(), 3);
        let stored = cases.current_case().expect("current").messages;
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_user());

        controller.submit(Submission::text("second")).await.expect("second");
        let instruction = &client.requests()[1].system_instruction;
        let context = instruction
            .split("\n\nContinue the analysis")
            .next()
            .expect("context");
        assert!(context.contains("1. User"));
        assert!(context.ends_with(": first"));
        assert!(!context.contains("Verum Omnis:"));
    }

    #[tokio::test]
    async fn transcript_log_only_keeps_turns_that_stay() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("session.log");
        let log_for = |client: ScriptedClient| {
            ConversationController::new(
                SessionContext::new(Arc::new(client))
                    .with_logging(TranscriptLog::open(&path).expect("open log")),
            )
        };

        let mut controller = log_for(ScriptedClient::failing(
            Vec::<&str>::new(),
            StreamError::Transport("offline".into()),
        ));
        controller.submit(Submission::text("lost")).await.unwrap_err();
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "");

        let mut controller = log_for(ScriptedClient::failing(
            ["half"],
            StreamError::Transport("offline".into()),
        ));
        controller.submit(Submission::text("kept")).await.unwrap_err();
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "You: kept\n\n");

        let mut controller = log_for(ScriptedClient::fragments(["Answer"]));
        controller.submit(Submission::text("asked")).await.expect("submit");
        let contents = std::fs::read_to_string(&path).expect("read");
        let asked = contents.find("You: asked").expect("user entry");
        let answer = contents.find("Verum Omnis: Answer").expect("reply entry");
        assert!(asked < answer);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_turn_is_rolled_back_before_the_next() {
        let cases = CaseService::in_memory();
        let client = ScriptedClient::fragments(["Answer"]).stalling(1);
        let mut controller = controller_with_case(client, &cases);

        let abandoned = tokio::time::timeout(
            Duration::from_secs(30),
            controller.submit(Submission::text("first")),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(controller.phase(), TurnPhase::Streaming);
        assert_eq!(cases.current_case().expect("current").messages.len(), 1);

        let id = controller
            .submit(Submission::text("second"))
            .await
            .expect("submit");
        assert_eq!(id, TurnId(4));
        let texts: Vec<&str> = controller
            .transcript()
            .iter()
            .map(|turn| turn.text.as_str())
            .collect();
        assert_eq!(texts, vec![GREETING, "second", "Answer"]);
        assert_eq!(cases.current_case().expect("current").messages.len(), 2);
        assert_eq!(controller.phase(), TurnPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_after_abandoned_turn_stores_rollback() {
        let cases = CaseService::in_memory();
        let client = ScriptedClient::fragments(["Answer"]).stalling(1);
        let mut controller = controller_with_case(client, &cases);
        let case_id = controller.case().expect("case").id.clone();

        let _ = tokio::time::timeout(
            Duration::from_secs(30),
            controller.submit(Submission::text("first")),
        )
        .await;
        controller.reset();

        assert_eq!(controller.phase(), TurnPhase::Idle);
        assert!(controller.case().is_none());
        let stored = cases
            .all_cases()
            .into_iter()
            .find(|case| case.id == case_id)
            .expect("stored case");
        assert!(stored.messages.is_empty());
    }
}
