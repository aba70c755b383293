//! Line-oriented quiz front end.

use quiz_core::model::{Question, QuestionKind, RawAnswer, Report};
use services::{QuizAttempt, QuizLoopService};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

type DynError = Box<dyn std::error::Error>;

/// What the learner typed for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Answer(RawAnswer),
    Skip,
    Quit,
    Invalid(String),
}

/// Interpret a line for `question`. Options are numbered from 1 on screen.
pub fn parse_input(question: &Question, line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed == ":quit" {
        return Input::Quit;
    }
    if trimmed.is_empty() {
        return Input::Skip;
    }

    match question.kind() {
        QuestionKind::MultipleChoice => match trimmed.parse::<usize>() {
            Ok(n) if (1..=question.options().len()).contains(&n) => {
                Input::Answer(RawAnswer::choice(n - 1))
            }
            _ => Input::Invalid(format!(
                "enter a number between 1 and {}",
                question.options().len()
            )),
        },
        QuestionKind::FillBlank | QuestionKind::ShortAnswer => {
            Input::Answer(RawAnswer::text(line))
        }
    }
}

fn render_question(question: &Question, position: usize, total: usize) -> String {
    let mut out = format!("\n[{position}/{total}] {}\n", question.prompt());
    for (i, option) in question.options().iter().enumerate() {
        out.push_str(&format!("  {}. {option}\n", i + 1));
    }
    out.push_str("> ");
    out
}

fn render_report(report: &Report) -> String {
    let mut out = format!(
        "\nScore: {}/{} ({:.0}%)\n",
        report.correct_count(),
        report.total_questions(),
        report.percentage()
    );
    for outcome in report.per_question() {
        let mark = match (outcome.answered, outcome.was_correct) {
            (_, true) => "correct",
            (true, false) => "wrong",
            (false, false) => "skipped",
        };
        out.push_str(&format!(
            "  #{} {mark}: {}\n",
            outcome.question_id, outcome.feedback
        ));
    }
    out
}

/// Drive `attempt` to completion, or until the learner quits.
///
/// Returns `Ok(false)` if the learner quit early; the attempt stays stored.
/// A completed attempt has its report stored before it is printed.
pub async fn run_attempt<R, W>(
    quiz: &QuizLoopService,
    attempt: &mut QuizAttempt,
    input: &mut R,
    output: &mut W,
) -> Result<bool, DynError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let bank = quiz.bank();
    let mut line = String::new();

    while !attempt.is_complete() {
        let Some(question) = attempt.current_question(bank) else {
            break;
        };
        let progress = attempt.progress();
        output
            .write_all(render_question(question, progress.position, progress.total).as_bytes())
            .await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            return Ok(false);
        }

        match parse_input(question, &line) {
            Input::Quit => return Ok(false),
            Input::Invalid(hint) => {
                output.write_all(format!("{hint}\n").as_bytes()).await?;
                continue;
            }
            Input::Skip => {}
            Input::Answer(answer) => {
                let fb = quiz.submit(attempt, answer).await?;
                let verdict = if fb.was_correct { "Correct!" } else { "Not quite." };
                output
                    .write_all(format!("{verdict} {}\n", fb.feedback).as_bytes())
                    .await?;
            }
        }

        quiz.advance(attempt).await?;
    }

    quiz.finalize_report(attempt).await?;
    let report = quiz.report(attempt)?;
    output.write_all(render_report(&report).as_bytes()).await?;
    output.flush().await?;
    Ok(true)
}
