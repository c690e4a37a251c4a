use crate::model::{Phase, VotingResults, VotingStatus};
use crate::page::{Field, View};
use crate::util::format_percentage;

pub const WINNER_CLASS: &str = "winner";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    StartsSoon,
    Open,
    Closed,
}

impl Badge {
    pub fn for_status(status: &VotingStatus) -> Badge {
        match (status.phase, status.is_voting_open) {
            (Phase::Waiting, _) => Badge::StartsSoon,
            (Phase::Active, true) => Badge::Open,
            _ => Badge::Closed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Badge::StartsSoon => "Starts soon",
            Badge::Open => "Voting open",
            Badge::Closed => "Voting closed",
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Badge::StartsSoon => "status-waiting",
            Badge::Open => "status-open",
            Badge::Closed => "status-closed",
        }
    }

    const ALL: [Badge; 3] = [Badge::StartsSoon, Badge::Open, Badge::Closed];
}

/// Vote count and badge; the parts of a status update that do not depend on
/// which countdown is active.
pub fn render_status(view: &View, status: &VotingStatus) {
    view.set_text(Field::TotalVotesCount, &status.total_votes.to_string());

    let badge = Badge::for_status(status);
    for other in Badge::ALL.iter().filter(|b| **b != badge) {
        view.remove_class(Field::StatusBadge, other.class());
    }
    view.add_class(Field::StatusBadge, badge.class());
    view.set_text(Field::StatusBadge, badge.label());
}

/// Writes every option tally into its elements. Safe to repeat with the same
/// payload. Options that disappeared from the payload keep their old values.
pub fn render_results(view: &View, results: &VotingResults) {
    for option in results.options.iter() {
        let percent = format_percentage(option.percentage);
        view.set_text(Field::OptionCount(option.id), &option.vote_count.to_string());
        view.set_text(Field::OptionPercent(option.id), &format!("{}%", percent));
        view.set_attribute(Field::OptionProgress(option.id), "style", &format!("width: {}%", percent));
        view.set_attribute(Field::OptionProgress(option.id), "aria-valuenow", &percent);
        if option.is_winner {
            view.add_class(Field::OptionCard(option.id), WINNER_CLASS);
        }
    }
    view.set_text(Field::TotalVotesDisplay, &results.total_votes.to_string());
}
