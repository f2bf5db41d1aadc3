// Game-level aggregates, tie-break classification and clutch situations.
//
// The exports carry no game-kind field, so tie-breaks are inferred from the
// score tokens and the game numbering. The heuristic is best-effort: no-ad
// scoring and super tie-break formats played outside set 3 can be
// misclassified.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::Point;
use crate::stats::{ratio, WinRate};

// ---------------------------------------------------------------------------
// Game kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Regular,
    SetTieBreak,
    MatchTieBreak,
}

impl GameKind {
    pub fn label(&self) -> &'static str {
        match self {
            GameKind::Regular => "regular",
            GameKind::SetTieBreak => "set_tie_break",
            GameKind::MatchTieBreak => "match_tie_break",
        }
    }

    pub fn is_tie_break(&self) -> bool {
        !matches!(self, GameKind::Regular)
    }
}

/// (set, game)
pub type GameKey = (u32, u32);

const STANDARD_TOKENS: &[&str] = &["0", "15", "30", "40", "AD"];
const MATCH_TIE_BREAK_SET: u32 = 3;
const SET_TIE_BREAK_GAME: u32 = 13;

/// A score pair standard game scoring cannot produce: a token outside
/// 0/15/30/40/AD, or AD against anything but 40. Pairs with a missing side
/// are not evidence either way.
fn is_impossible_score(host: Option<&str>, guest: Option<&str>) -> bool {
    let (Some(host), Some(guest)) = (host.map(str::trim), guest.map(str::trim)) else {
        return false;
    };
    if host.is_empty() || guest.is_empty() {
        return false;
    }
    if !STANDARD_TOKENS.contains(&host) || !STANDARD_TOKENS.contains(&guest) {
        return true;
    }
    (host == "AD" && guest != "40") || (guest == "AD" && host != "40")
}

/// Classify every (set, game) present in one match's points.
pub fn classify_games(points: &[Point]) -> BTreeMap<GameKey, GameKind> {
    let mut impossible: BTreeMap<GameKey, bool> = BTreeMap::new();
    for p in points {
        let flag = impossible.entry((p.set, p.game)).or_insert(false);
        *flag |= is_impossible_score(p.host_game_score.as_deref(), p.guest_game_score.as_deref());
    }

    let mut games_per_set: BTreeMap<u32, usize> = BTreeMap::new();
    let mut last_game: BTreeMap<u32, u32> = BTreeMap::new();
    for &(set, game) in impossible.keys() {
        *games_per_set.entry(set).or_default() += 1;
        let last = last_game.entry(set).or_insert(game);
        *last = (*last).max(game);
    }

    impossible
        .iter()
        .map(|(&(set, game), &odd_score)| {
            let kind = if set == MATCH_TIE_BREAK_SET && (games_per_set[&set] == 1 || odd_score) {
                GameKind::MatchTieBreak
            } else if odd_score || (game == SET_TIE_BREAK_GAME && last_game[&set] == game) {
                GameKind::SetTieBreak
            } else {
                GameKind::Regular
            };
            ((set, game), kind)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Service and return games
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameMetrics {
    pub service_games: WinRate,
    pub return_games: WinRate,
}

/// Group points by (set, game) and keep the last one of each group.
fn terminal_points<'a, I>(points: I) -> BTreeMap<GameKey, &'a Point>
where
    I: IntoIterator<Item = &'a Point>,
{
    let mut last: BTreeMap<GameKey, &Point> = BTreeMap::new();
    for p in points {
        last.entry((p.set, p.game))
            .and_modify(|cur| {
                if p.point >= cur.point {
                    *cur = p;
                }
            })
            .or_insert(p);
    }
    last
}

/// A game is held or broken according to the winner of its terminal point.
/// Service games are the (set, game) groups of points the subject served;
/// return games those of points the opponent served.
pub fn compute_games(points: &[Point], subject: &str) -> GameMetrics {
    let service = terminal_points(points.iter().filter(|p| p.match_server == subject));
    let returns = terminal_points(points.iter().filter(|p| p.match_server != subject));
    GameMetrics {
        service_games: WinRate::from_outcomes(service.values().map(|p| p.point_winner == subject)),
        return_games: WinRate::from_outcomes(returns.values().map(|p| p.point_winner == subject)),
    }
}

// ---------------------------------------------------------------------------
// Tie-breaks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TieBreakMetrics {
    pub set_tie_breaks: WinRate,
    pub match_tie_breaks: WinRate,
    /// Points played inside either kind of tie-break.
    pub tie_break_points: WinRate,
}

pub fn compute_tie_breaks(
    points: &[Point],
    kinds: &BTreeMap<GameKey, GameKind>,
    subject: &str,
) -> TieBreakMetrics {
    let mut m = TieBreakMetrics::default();
    for ((set, game), p) in terminal_points(points) {
        match kinds.get(&(set, game)) {
            Some(GameKind::SetTieBreak) => m.set_tie_breaks.record(p.point_winner == subject),
            Some(GameKind::MatchTieBreak) => m.match_tie_breaks.record(p.point_winner == subject),
            _ => {}
        }
    }
    for p in points {
        if kinds.get(&(p.set, p.game)).is_some_and(GameKind::is_tie_break) {
            m.tie_break_points.record(p.point_winner == subject);
        }
    }
    m
}

// ---------------------------------------------------------------------------
// Clutch
// ---------------------------------------------------------------------------

/// Win rates in pressure situations. Regular games only: deuce and advantage
/// do not exist in tie-break scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClutchMetrics {
    pub break_point: WinRate,
    pub set_point: WinRate,
    pub deuce_or_ad: WinRate,
    pub tight_game: WinRate,
    /// Share of regular-game points that were any of the above.
    pub pressure_point_share: f64,
}

fn is_deuce_or_ad(host: &str, guest: &str) -> bool {
    (host == "40" && guest == "40") || host == "AD" || guest == "AD"
}

fn is_tight(host: &str, guest: &str) -> bool {
    let close = |s: &str| s == "30" || s == "40";
    close(host) && close(guest)
}

pub fn compute_clutch(
    points: &[Point],
    kinds: &BTreeMap<GameKey, GameKind>,
    subject: &str,
) -> ClutchMetrics {
    let mut m = ClutchMetrics::default();
    let mut regular = 0u32;
    let mut pressure = 0u32;

    for p in points {
        if kinds.get(&(p.set, p.game)) != Some(&GameKind::Regular) {
            continue;
        }
        regular += 1;
        let won = p.point_winner == subject;
        let host = p.host_game_score.as_deref().unwrap_or("").trim();
        let guest = p.guest_game_score.as_deref().unwrap_or("").trim();

        let situations = [
            (p.break_point, &mut m.break_point),
            (p.set_point, &mut m.set_point),
            (is_deuce_or_ad(host, guest), &mut m.deuce_or_ad),
            (is_tight(host, guest), &mut m.tight_game),
        ];
        let mut any = false;
        for (applies, rate) in situations {
            if applies {
                rate.record(won);
                any = true;
            }
        }
        pressure += u32::from(any);
    }

    m.pressure_point_share = ratio(pressure, regular);
    m
}
