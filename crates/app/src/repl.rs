//! Line-oriented terminal front-end over `ExamController`.

use std::error::Error;
use std::io::Write as _;
use std::time::Duration;

use exam_core::model::{Answer, AnswerInput, OptionId, Question, QuestionKind, Test};
use services::presenter::COUNT_UP_FRAMES;
use services::sessions::format_clock;
use services::{
    ControllerError, ControllerUpdate, ExamController, JobStatus, PageKind, ResultView,
    SessionPhase, Urgency, render_text,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const COUNT_UP_FRAME: Duration = Duration::from_millis(25);

enum Flow {
    Continue,
    Quit,
}

pub async fn run(controller: &mut ExamController, extract_topics: bool) -> Result<(), Box<dyn Error>> {
    if extract_topics {
        let topics = controller.extract_topics().await?;
        println!("Topics: {}", topics.join(", "));
    }
    controller.begin_generation()?;
    println!("Generating your test...");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_urgency = Urgency::Calm;

    loop {
        tokio::select! {
            event = controller.next_event() => {
                let Some(event) = event else { break };
                let update = controller.handle(event);
                if let Flow::Quit = on_update(controller, update, &mut last_urgency).await {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    controller.leave();
                    break;
                };
                match on_command(controller, line.trim()) {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(err) => println!("error: {err}"),
                }
            }
        }
    }
    Ok(())
}

async fn on_update(
    controller: &ExamController,
    update: ControllerUpdate,
    last_urgency: &mut Urgency,
) -> Flow {
    match update {
        ControllerUpdate::TestReady(test) => {
            print_test_summary(&test);
            println!("Type `start` to begin, `regen` for a new test, or `quit`.");
        }
        ControllerUpdate::GenerationFailed(err) => {
            println!("Generation failed: {err}");
            if controller.page() == PageKind::Ready {
                println!("The previous test is still available. `start`, `regen` or `quit`.");
            } else {
                println!("Type `regen` to try again or `quit`.");
            }
        }
        ControllerUpdate::Tick { remaining, urgency } => {
            if urgency != *last_urgency || remaining % 60 == 0 || remaining <= 10 {
                println!("[{} left]", format_clock(remaining));
            }
            *last_urgency = urgency;
        }
        ControllerUpdate::TimedOut => {
            println!("Time is up. Your answers were submitted automatically.");
            println!("Grading...");
        }
        ControllerUpdate::Graded(_) => {
            let view = controller.result_view();
            println!();
            animate_score(&view).await;
            println!("{}", render_text(&view));
            return Flow::Quit;
        }
        ControllerUpdate::GradingFailed(err) => {
            println!("Grading failed: {err}");
            println!("Type `retry` to submit again or `quit`.");
        }
        ControllerUpdate::Discarded => {}
    }
    Flow::Continue
}

fn on_command(controller: &mut ExamController, line: &str) -> Result<Flow, ControllerError> {
    let (command, rest) = line
        .split_once(' ')
        .map_or((line, ""), |(command, rest)| (command, rest.trim()));
    if matches!(command, "quit" | "q") && controller.page() != PageKind::Session {
        controller.leave();
        return Ok(Flow::Quit);
    }

    match controller.page() {
        PageKind::Configure | PageKind::Ready if command == "regen" => {
            controller.begin_generation()?;
            println!("Generating your test...");
        }
        PageKind::Ready if command == "start" => {
            controller.start_test()?;
            print_current(controller);
        }
        PageKind::Session => return session_command(controller, command, rest),
        PageKind::Grading if command == "retry" => {
            controller.retry_submission()?;
            println!("Grading...");
        }
        PageKind::Grading => match controller.grading_status() {
            Some(JobStatus::Failed(message)) => {
                println!("Grading failed: {message}. Type `retry` or `quit`.");
            }
            _ => println!("Grading in progress, please wait..."),
        },
        PageKind::Generating => println!("Please wait..."),
        _ if command.is_empty() => {}
        _ => println!("Unknown command: {command}"),
    }
    Ok(Flow::Continue)
}

fn session_command(
    controller: &mut ExamController,
    command: &str,
    rest: &str,
) -> Result<Flow, ControllerError> {
    let confirming = controller
        .session()
        .is_some_and(|session| session.phase() == SessionPhase::ConfirmingSubmission);

    if confirming {
        match command {
            "y" | "yes" => {
                controller.confirm_submission()?;
                println!("Submitted. Grading...");
            }
            "n" | "no" => {
                controller.cancel_submission()?;
                print_current(controller);
            }
            _ => println!("Submit now? (y/n)"),
        }
        return Ok(Flow::Continue);
    }

    match command {
        "n" | "next" => {
            controller.next()?;
            print_current(controller);
        }
        "p" | "prev" => {
            controller.previous()?;
            print_current(controller);
        }
        "g" | "goto" => {
            match rest.parse::<usize>() {
                Ok(number) if number > 0 => {
                    controller.go_to(number - 1)?;
                }
                _ => println!("Usage: g <question number>"),
            }
            print_current(controller);
        }
        "a" | "answer" => {
            controller.answer_current(AnswerInput::Choose(OptionId::new(rest)))?;
            print_current(controller);
        }
        "t" | "text" => {
            controller.answer_current(AnswerInput::Text(rest.to_string()))?;
            println!("Answer saved.");
        }
        "s" | "submit" => {
            controller.request_submission()?;
            if let Some(progress) = controller.session().map(|session| session.progress()) {
                println!(
                    "You answered {} of {} questions ({} unanswered). Submit now? (y/n)",
                    progress.answered,
                    progress.total,
                    progress.unanswered()
                );
            }
        }
        "q" | "quit" => {
            controller.leave();
            println!("Session abandoned.");
            return Ok(Flow::Quit);
        }
        "" => print_current(controller),
        _ => println!("Commands: n, p, g <num>, a <option>, t <text>, s, q"),
    }
    Ok(Flow::Continue)
}

/// Count the score up from zero on one line; display only.
async fn animate_score(view: &ResultView) {
    let ResultView::Ready(card) = view else {
        return;
    };
    let mut interval = tokio::time::interval(COUNT_UP_FRAME);
    let mut stdout = std::io::stdout();
    for frame in card.count_up(COUNT_UP_FRAMES) {
        interval.tick().await;
        print!("\rScore: {frame}%");
        let _ = stdout.flush();
    }
    println!();
}

fn print_test_summary(test: &Test) {
    println!();
    println!("{} ({})", test.name(), test.subject());
    println!(
        "{} questions, {} minutes",
        test.question_count(),
        test.duration_minutes()
    );
}

fn print_current(controller: &ExamController) {
    let Some(session) = controller.session() else {
        return;
    };
    let Some(question) = session.current_question() else {
        return;
    };
    let progress = session.progress();
    println!();
    println!(
        "Question {} of {}  [{} answered]  {}",
        progress.current + 1,
        progress.total,
        progress.answered,
        format_clock(session.remaining_seconds())
    );
    print_question(question, session.answers().get(question.id()));
}

fn print_question(question: &Question, answer: Option<&Answer>) {
    println!("{}", question.text());
    match question.kind() {
        QuestionKind::FreeText => {
            if let Some(Answer::Text(text)) = answer {
                println!("  your answer: {text}");
            }
            println!("  (answer with `t <text>`)");
        }
        kind => {
            for option in question.options() {
                let chosen = match answer {
                    Some(Answer::Single(id)) => *id == option.id,
                    Some(Answer::Multi(ids)) => ids.contains(&option.id),
                    _ => false,
                };
                let mark = if chosen { "x" } else { " " };
                println!("  [{mark}] {}: {}", option.id, option.text);
            }
            if kind == QuestionKind::MultiSelect {
                println!("  (select all that apply; `a <id>` toggles)");
            }
        }
    }
}
