//! Read-only view of a graded test.
//!
//! Nothing here mutates the `TestResult`; the count-up animation only yields
//! display frames.

use std::fmt::Write as _;

use exam_core::model::TestResult;

pub const NO_RESULT_MESSAGE: &str = "No result data found.";

/// Default number of animation steps between 0 and the final score.
pub const COUNT_UP_FRAMES: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Strong,
    Fair,
    Weak,
}

impl ScoreBand {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Strong
        } else if score >= 60.0 {
            Self::Fair
        } else {
            Self::Weak
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Strong => "Excellent work",
            Self::Fair => "Good effort",
            Self::Weak => "Keep practicing",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultCard {
    /// Score rounded to a whole percentage.
    pub score: u32,
    pub band: ScoreBand,
    pub headline: String,
    pub summary: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

impl ResultCard {
    /// Frames for the score animation, ending on the final score.
    #[must_use]
    pub fn count_up(&self, frames: u32) -> CountUp {
        CountUp::new(self.score, frames)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultView {
    NoResult,
    Ready(ResultCard),
}

#[must_use]
pub fn present(result: Option<&TestResult>) -> ResultView {
    let Some(result) = result else {
        return ResultView::NoResult;
    };
    let score = result.score().round().clamp(0.0, 100.0) as u32;
    ResultView::Ready(ResultCard {
        score,
        band: ScoreBand::from_score(result.score()),
        headline: format!(
            "You answered {} out of {} questions correctly.",
            result.correct_answers(),
            result.total_questions()
        ),
        summary: result.ai_summary().to_string(),
        strengths: result.strengths().to_vec(),
        improvements: result.weaknesses().to_vec(),
    })
}

/// Finite, non-decreasing sequence of integers from 0 to a target.
#[derive(Debug, Clone)]
pub struct CountUp {
    target: u32,
    frames: u32,
    next: u64,
}

impl CountUp {
    #[must_use]
    pub fn new(target: u32, frames: u32) -> Self {
        Self {
            target,
            frames: frames.max(1),
            next: 0,
        }
    }
}

impl Iterator for CountUp {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next > u64::from(self.frames) {
            return None;
        }
        let value = u64::from(self.target) * self.next / u64::from(self.frames);
        self.next += 1;
        u32::try_from(value).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (u64::from(self.frames) + 1).saturating_sub(self.next);
        match usize::try_from(left) {
            Ok(left) => (left, Some(left)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Plain-text rendering used by the terminal front-end.
#[must_use]
pub fn render_text(view: &ResultView) -> String {
    let card = match view {
        ResultView::NoResult => return NO_RESULT_MESSAGE.to_string(),
        ResultView::Ready(card) => card,
    };

    let mut out = String::new();
    let _ = writeln!(out, "Score: {}%  ({})", card.score, card.band.label());
    let _ = writeln!(out, "{}", card.headline);
    if !card.summary.trim().is_empty() {
        let _ = writeln!(out, "\nAI summary\n  {}", card.summary.trim());
    }
    let _ = writeln!(out, "\nStrengths");
    for item in &card.strengths {
        let _ = writeln!(out, "  + {item}");
    }
    let _ = writeln!(out, "\nAreas for improvement");
    for item in &card.improvements {
        let _ = writeln!(out, "  - {item}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f64, correct: u32, total: u32) -> TestResult {
        TestResult::new(
            score,
            correct,
            total,
            "Good grasp of hooks.",
            vec!["Hooks".into()],
            vec!["Context API".into()],
        )
        .unwrap()
    }

    #[test]
    fn missing_result_has_explicit_state() {
        let view = present(None);
        assert_eq!(view, ResultView::NoResult);
        assert_eq!(render_text(&view), "No result data found.");
    }

    #[test]
    fn score_bands() {
        assert_eq!(ScoreBand::from_score(80.0), ScoreBand::Strong);
        assert_eq!(ScoreBand::from_score(79.9), ScoreBand::Fair);
        assert_eq!(ScoreBand::from_score(60.0), ScoreBand::Fair);
        assert_eq!(ScoreBand::from_score(59.0), ScoreBand::Weak);
    }

    #[test]
    fn card_reflects_result() {
        let stored = result(66.7, 2, 3);
        let ResultView::Ready(card) = present(Some(&stored)) else {
            panic!("expected a result card");
        };
        assert_eq!(card.score, 67);
        assert_eq!(card.band, ScoreBand::Fair);
        assert_eq!(card.headline, "You answered 2 out of 3 questions correctly.");

        let text = render_text(&ResultView::Ready(card));
        assert!(text.contains("Score: 67%"));
        assert!(text.contains("  + Hooks"));
        assert!(text.contains("  - Context API"));
        // Presenting never touches the stored result.
        assert_eq!(stored.score(), 66.7);
    }

    #[test]
    fn count_up_ends_on_score() {
        let ResultView::Ready(card) = present(Some(&result(85.0, 17, 20))) else {
            panic!("expected a result card");
        };
        let frames: Vec<u32> = card.count_up(10).collect();
        assert_eq!(frames.len(), 11);
        assert_eq!(frames.first(), Some(&0));
        assert_eq!(frames.last(), Some(&85));
        assert!(frames.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(card.count_up(COUNT_UP_FRAMES).last(), Some(85));
    }

    #[test]
    fn huge_frame_count_does_not_overflow() {
        let mut frames = CountUp::new(50, u32::MAX);
        assert_eq!(frames.size_hint().1.map(|left| left as u64), Some(u64::from(u32::MAX) + 1));
        assert_eq!(frames.next(), Some(0));
        frames.next = u64::from(u32::MAX);
        assert_eq!(frames.size_hint(), (1, Some(1)));
        assert_eq!(frames.next(), Some(50));
        assert_eq!(frames.next(), None);
        assert_eq!(frames.size_hint(), (0, Some(0)));
    }

    #[test]
    fn zero_frames_still_terminates() {
        let frames: Vec<u32> = CountUp::new(50, 0).collect();
        assert_eq!(frames, vec![0, 50]);
    }
}
