use std::fmt;
use std::sync::Arc;

use exam_core::Clock;
use exam_core::model::{
    AnswerError, AnswerInput, AnswerSheet, Question, QuestionId, SubmissionPayload,
    SubmissionTrigger, Test,
};
use tracing::{debug, info};

use super::progress::SessionProgress;
use super::timer::{Countdown, CountdownStep, Urgency};
use crate::epoch::Ticket;
use crate::error::SessionError;

//
// ─── PHASES ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    NotStarted,
    InProgress,
    ConfirmingSubmission,
    Submitted,
}

impl SessionPhase {
    /// Phases in which the countdown is running.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::InProgress | Self::ConfirmingSubmission)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::ConfirmingSubmission => "confirming submission",
            Self::Submitted => "submitted",
        };
        f.write_str(label)
    }
}

/// What a timer tick did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Running { remaining: u32, urgency: Urgency },
    /// Time ran out; the session is now submitted.
    ForcedSubmission(SubmissionPayload),
    /// The tick belonged to a countdown that is no longer active.
    Ignored,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One attempt at a generated test.
///
/// Walks `NotStarted → InProgress ⇄ ConfirmingSubmission → Submitted`.
/// `Submitted` is terminal: every mutating call afterwards fails with
/// `SessionError::InvalidState` and leaves the answers untouched.
pub struct SessionMachine {
    clock: Clock,
    phase: SessionPhase,
    test: Option<Arc<Test>>,
    current: usize,
    answers: AnswerSheet,
    countdown: Countdown,
    timer: Option<Ticket>,
    trigger: Option<SubmissionTrigger>,
}

impl SessionMachine {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            phase: SessionPhase::NotStarted,
            test: None,
            current: 0,
            answers: AnswerSheet::new(),
            countdown: Countdown::new(0),
            timer: None,
            trigger: None,
        }
    }

    /// Begin answering `test`, with the countdown bound to `timer`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `NotStarted`.
    pub fn start(&mut self, test: Arc<Test>, timer: Ticket) -> Result<(), SessionError> {
        self.ensure_phase("start", &[SessionPhase::NotStarted])?;

        self.countdown = Countdown::new(test.duration_seconds());
        self.current = 0;
        self.answers = AnswerSheet::new();
        self.timer = Some(timer);
        info!(
            test_id = %test.id(),
            questions = test.question_count(),
            seconds = self.countdown.total(),
            "session started"
        );
        self.test = Some(test);
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn test(&self) -> Option<&Arc<Test>> {
        self.test.as_ref()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.test.as_ref()?.question(self.current)
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.countdown.remaining()
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u32 {
        self.countdown.elapsed()
    }

    #[must_use]
    pub fn urgency(&self) -> Urgency {
        self.countdown.urgency()
    }

    /// How the session ended, once it has.
    #[must_use]
    pub fn trigger(&self) -> Option<SubmissionTrigger> {
        self.trigger
    }

    /// Ticket of the running countdown, if any.
    #[must_use]
    pub fn timer_ticket(&self) -> Option<Ticket> {
        self.timer
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answered_flags: Vec<bool> = self.test.as_ref().map_or_else(Vec::new, |test| {
            test.questions()
                .iter()
                .map(|question| self.answers.is_answered(question.id()))
                .collect()
        });
        SessionProgress {
            total: answered_flags.len(),
            answered: answered_flags.iter().filter(|answered| **answered).count(),
            current: self.current,
            answered_flags,
            phase: self.phase,
        }
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Jump to `index`. Out-of-range indexes leave the pointer where it is.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `InProgress`.
    pub fn go_to(&mut self, index: usize) -> Result<usize, SessionError> {
        self.ensure_phase("navigate", &[SessionPhase::InProgress])?;
        if index < self.question_count() {
            self.current = index;
        }
        Ok(self.current)
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `InProgress`.
    pub fn next(&mut self) -> Result<usize, SessionError> {
        let target = (self.current + 1).min(self.question_count().saturating_sub(1));
        self.go_to(target)
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `InProgress`.
    pub fn previous(&mut self) -> Result<usize, SessionError> {
        self.go_to(self.current.saturating_sub(1))
    }

    //
    // ─── ANSWERS ───────────────────────────────────────────────────────────────
    //

    /// Record an answer for `question`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `InProgress`,
    /// or `SessionError::Answer` if the question or option is unknown.
    pub fn set_answer(
        &mut self,
        question: &QuestionId,
        input: AnswerInput,
    ) -> Result<(), SessionError> {
        self.ensure_phase("set an answer", &[SessionPhase::InProgress])?;
        let test = self
            .test
            .as_ref()
            .ok_or(SessionError::InvalidState {
                operation: "set an answer",
                phase: self.phase,
            })?;
        let question = test
            .find_question(question)
            .ok_or_else(|| AnswerError::UnknownQuestion(question.clone()))?;
        self.answers.apply(question, input)?;
        Ok(())
    }

    /// Answer whichever question is currently shown.
    ///
    /// # Errors
    ///
    /// Same as [`SessionMachine::set_answer`].
    pub fn answer_current(&mut self, input: AnswerInput) -> Result<(), SessionError> {
        let id = self
            .current_question()
            .map(|question| question.id().clone())
            .ok_or(SessionError::InvalidState {
                operation: "set an answer",
                phase: self.phase,
            })?;
        self.set_answer(&id, input)
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// Open the confirmation gate. Grading is not contacted yet.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `InProgress`.
    pub fn request_submission(&mut self) -> Result<(), SessionError> {
        self.ensure_phase("request submission", &[SessionPhase::InProgress])?;
        self.phase = SessionPhase::ConfirmingSubmission;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is
    /// `ConfirmingSubmission`.
    pub fn cancel_submission(&mut self) -> Result<(), SessionError> {
        self.ensure_phase("cancel submission", &[SessionPhase::ConfirmingSubmission])?;
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Submit and hand the answers over for grading.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is
    /// `ConfirmingSubmission`.
    pub fn confirm_submission(&mut self) -> Result<SubmissionPayload, SessionError> {
        self.ensure_phase("confirm submission", &[SessionPhase::ConfirmingSubmission])?;
        self.finish(SubmissionTrigger::Confirmed)
    }

    /// Apply one countdown tick carrying `ticket`.
    ///
    /// Ticks from a countdown that is no longer current, or arriving after the
    /// session left its live phases, are ignored.
    pub fn tick(&mut self, ticket: Ticket) -> Result<TickOutcome, SessionError> {
        if !self.phase.is_live() || self.timer != Some(ticket) {
            debug!(phase = %self.phase, "ignoring stale timer tick");
            return Ok(TickOutcome::Ignored);
        }

        match self.countdown.tick() {
            CountdownStep::Running { remaining } => Ok(TickOutcome::Running {
                remaining,
                urgency: self.countdown.urgency(),
            }),
            CountdownStep::Expired | CountdownStep::Idle => {
                info!("time is up, submitting automatically");
                self.finish(SubmissionTrigger::Timeout)
                    .map(TickOutcome::ForcedSubmission)
            }
        }
    }

    /// Stop the countdown without submitting, e.g. when the learner leaves.
    pub fn abandon(&mut self) {
        if self.timer.take().is_some() {
            debug!(phase = %self.phase, "session abandoned");
        }
    }

    fn finish(&mut self, trigger: SubmissionTrigger) -> Result<SubmissionPayload, SessionError> {
        let test = self.test.clone().ok_or(SessionError::InvalidState {
            operation: "submit",
            phase: self.phase,
        })?;
        self.phase = SessionPhase::Submitted;
        self.timer = None;
        self.trigger = Some(trigger);
        info!(
            test_id = %test.id(),
            answered = self.answers.len(),
            elapsed = self.countdown.elapsed(),
            ?trigger,
            "session submitted"
        );

        Ok(SubmissionPayload {
            test,
            answers: self.answers.clone(),
            elapsed_seconds: self.countdown.elapsed(),
            trigger,
            submitted_at: self.clock.now(),
        })
    }

    fn question_count(&self) -> usize {
        self.test.as_ref().map_or(0, |test| test.question_count())
    }

    fn ensure_phase(
        &self,
        operation: &'static str,
        allowed: &[SessionPhase],
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                phase: self.phase,
            })
        }
    }
}

impl fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMachine")
            .field("phase", &self.phase)
            .field("test_id", &self.test.as_ref().map(|test| test.id().clone()))
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("remaining", &self.countdown.remaining())
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::epoch::Epoch;
    use exam_core::model::{
        Answer, CorrectAnswer, OptionId, QuestionKind, QuestionOption, TestId,
    };
    use exam_core::time::fixed_clock;

    fn select(id: &str, kind: QuestionKind) -> Question {
        let key = match kind {
            QuestionKind::MultiSelect => {
                CorrectAnswer::Options(BTreeSet::from([OptionId::new("o1")]))
            }
            _ => CorrectAnswer::Option(OptionId::new("o1")),
        };
        Question::new(
            QuestionId::new(id),
            kind,
            "Pick one",
            vec![QuestionOption::new("o1", "one"), QuestionOption::new("o2", "two")],
            key,
            "",
        )
        .unwrap()
    }

    fn build_test(duration_minutes: u32) -> Arc<Test> {
        Arc::new(
            Test::new(
                TestId::new("t1"),
                "React Fundamentals",
                "React",
                duration_minutes,
                vec![
                    select("q1", QuestionKind::SingleSelect),
                    select("q2", QuestionKind::MultiSelect),
                ],
            )
            .unwrap(),
        )
    }

    fn started(duration_minutes: u32) -> (SessionMachine, Ticket) {
        let mut epoch = Epoch::new();
        let ticket = epoch.issue();
        let mut session = SessionMachine::new(fixed_clock());
        session.start(build_test(duration_minutes), ticket).unwrap();
        (session, ticket)
    }

    fn choose(option: &str) -> AnswerInput {
        AnswerInput::Choose(OptionId::new(option))
    }

    #[test]
    fn start_initializes_state() {
        let (session, _) = started(15);
        assert_eq!(session.phase(), SessionPhase::InProgress);
        assert_eq!(session.current_index(), 0);
        assert!(session.answers().is_empty());
        assert_eq!(session.remaining_seconds(), 900);
    }

    #[test]
    fn start_twice_is_invalid() {
        let (mut session, ticket) = started(1);
        let err = session.start(build_test(1), ticket).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { operation: "start", .. }));
    }

    #[test]
    fn go_to_out_of_range_is_noop() {
        let (mut session, _) = started(1);
        assert_eq!(session.go_to(1).unwrap(), 1);
        assert_eq!(session.go_to(7).unwrap(), 1);
        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(session.previous().unwrap(), 0);
        assert_eq!(session.previous().unwrap(), 0);
    }

    #[test]
    fn single_select_answer_is_replaced() {
        let (mut session, _) = started(1);
        let q1 = QuestionId::new("q1");
        session.set_answer(&q1, choose("o1")).unwrap();
        session.set_answer(&q1, choose("o2")).unwrap();
        assert_eq!(
            session.answers().get(&q1),
            Some(&Answer::Single(OptionId::new("o2")))
        );
    }

    #[test]
    fn answering_does_not_advance() {
        let (mut session, _) = started(1);
        session.answer_current(choose("o1")).unwrap();
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn unknown_question_is_rejected() {
        let (mut session, _) = started(1);
        let err = session
            .set_answer(&QuestionId::new("q9"), choose("o1"))
            .unwrap_err();
        assert!(matches!(err, SessionError::Answer(AnswerError::UnknownQuestion(_))));
    }

    #[test]
    fn confirmation_gate_can_be_cancelled() {
        let (mut session, _) = started(1);
        session.request_submission().unwrap();
        assert_eq!(session.phase(), SessionPhase::ConfirmingSubmission);
        assert!(session.set_answer(&QuestionId::new("q1"), choose("o1")).is_err());

        session.cancel_submission().unwrap();
        assert_eq!(session.phase(), SessionPhase::InProgress);
        session.set_answer(&QuestionId::new("q1"), choose("o1")).unwrap();
    }

    #[test]
    fn confirm_requires_gate() {
        let (mut session, _) = started(1);
        assert!(matches!(
            session.confirm_submission(),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn confirmed_session_rejects_mutation() {
        let (mut session, ticket) = started(1);
        session.set_answer(&QuestionId::new("q1"), choose("o1")).unwrap();
        session.tick(ticket).unwrap();
        session.request_submission().unwrap();
        let payload = session.confirm_submission().unwrap();

        assert_eq!(payload.trigger, SubmissionTrigger::Confirmed);
        assert_eq!(payload.elapsed_seconds, 1);
        assert_eq!(payload.answers.len(), 1);

        let before = session.answers().clone();
        assert!(matches!(
            session.set_answer(&QuestionId::new("q1"), choose("o2")),
            Err(SessionError::InvalidState { phase: SessionPhase::Submitted, .. })
        ));
        assert!(matches!(
            session.go_to(1),
            Err(SessionError::InvalidState { .. })
        ));
        assert_eq!(session.answers(), &before);
        assert_eq!(session.tick(ticket).unwrap(), TickOutcome::Ignored);
    }

    #[test]
    fn timeout_forces_submission_after_exact_duration() {
        let (mut session, ticket) = started(1);
        let mut last = session.remaining_seconds();

        for _ in 0..59 {
            match session.tick(ticket).unwrap() {
                TickOutcome::Running { remaining, .. } => {
                    assert_eq!(remaining, last - 1);
                    last = remaining;
                }
                other => panic!("unexpected tick outcome: {other:?}"),
            }
        }
        assert_eq!(session.remaining_seconds(), 1);

        let TickOutcome::ForcedSubmission(payload) = session.tick(ticket).unwrap() else {
            panic!("expected forced submission");
        };
        assert_eq!(session.remaining_seconds(), 0);
        assert_eq!(payload.trigger, SubmissionTrigger::Timeout);
        assert!(payload.answers.is_empty());
        assert_eq!(payload.elapsed_seconds, 60);
        assert_eq!(session.phase(), SessionPhase::Submitted);

        // Fires only once.
        assert_eq!(session.tick(ticket).unwrap(), TickOutcome::Ignored);
        assert_eq!(session.remaining_seconds(), 0);
    }

    #[test]
    fn timeout_while_confirming_still_submits() {
        let (mut session, ticket) = started(1);
        session.request_submission().unwrap();
        let mut outcome = TickOutcome::Ignored;
        for _ in 0..60 {
            outcome = session.tick(ticket).unwrap();
        }
        assert!(matches!(outcome, TickOutcome::ForcedSubmission(_)));
        assert_eq!(session.trigger(), Some(SubmissionTrigger::Timeout));
    }

    #[test]
    fn foreign_ticket_does_not_move_the_clock() {
        let mut epoch = Epoch::new();
        let old = epoch.issue();
        let current = epoch.issue();
        let mut session = SessionMachine::new(fixed_clock());
        session.start(build_test(1), current).unwrap();

        assert_eq!(session.tick(old).unwrap(), TickOutcome::Ignored);
        assert_eq!(session.remaining_seconds(), 60);
    }

    #[test]
    fn abandoned_session_ignores_ticks() {
        let (mut session, ticket) = started(1);
        session.abandon();
        assert_eq!(session.tick(ticket).unwrap(), TickOutcome::Ignored);
        assert_eq!(session.remaining_seconds(), 60);
    }

    #[test]
    fn progress_tracks_answered_questions() {
        let (mut session, _) = started(1);
        session.set_answer(&QuestionId::new("q2"), choose("o2")).unwrap();
        let progress = session.progress();
        assert_eq!(progress.total, 2);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.unanswered(), 1);
        assert_eq!(progress.answered_flags, vec![false, true]);
    }
}
