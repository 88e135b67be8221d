//! Trading signals: interpret indicator values as entry/exit triggers.

use crate::engine::IndicatorId;
use crate::strategy::{Ctx, SetupCtx, Strategy};

/// How a signal line's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    None,
    /// Positive = long, negative = short (reversing).
    LongShort,
    /// Positive = enter long.
    Long,
    /// Negative = enter long.
    LongInv,
    /// Any nonzero = enter long.
    LongAny,
    /// Negative = enter short.
    Short,
    /// Positive = enter short.
    ShortInv,
    /// Any nonzero = enter short.
    ShortAny,
    /// Negative = exit long.
    LongExit,
    /// Positive = exit long.
    LongExitInv,
    /// Any nonzero = exit long.
    LongExitAny,
    /// Positive = exit short.
    ShortExit,
    /// Negative = exit short.
    ShortExitInv,
    /// Any nonzero = exit short.
    ShortExitAny,
}

impl SignalKind {
    pub fn is_long_entry(self) -> bool {
        matches!(
            self,
            SignalKind::LongShort | SignalKind::Long | SignalKind::LongInv | SignalKind::LongAny
        )
    }

    pub fn is_short_entry(self) -> bool {
        matches!(
            self,
            SignalKind::LongShort | SignalKind::Short | SignalKind::ShortInv | SignalKind::ShortAny
        )
    }

    pub fn is_long_exit(self) -> bool {
        matches!(
            self,
            SignalKind::LongExit | SignalKind::LongExitInv | SignalKind::LongExitAny
        )
    }

    pub fn is_short_exit(self) -> bool {
        matches!(
            self,
            SignalKind::ShortExit | SignalKind::ShortExitInv | SignalKind::ShortExitAny
        )
    }
}

/// Map a signal value to −1 (short direction), 0 (nothing) or +1 (long
/// direction). Zero and NaN never trigger; the `*Any` kinds trigger on
/// every nonzero value.
pub fn evaluate(value: f64, kind: SignalKind) -> i32 {
    if value == 0.0 || value.is_nan() {
        return 0;
    }
    match kind {
        SignalKind::None => 0,
        SignalKind::LongShort => {
            if value > 0.0 {
                1
            } else {
                -1
            }
        }
        SignalKind::Long => (value > 0.0) as i32,
        SignalKind::LongInv => (value < 0.0) as i32,
        SignalKind::LongAny => 1,
        SignalKind::Short => -((value < 0.0) as i32),
        SignalKind::ShortInv => -((value > 0.0) as i32),
        SignalKind::ShortAny => -1,
        SignalKind::LongExit => (value < 0.0) as i32,
        SignalKind::LongExitInv => (value > 0.0) as i32,
        SignalKind::LongExitAny => 1,
        SignalKind::ShortExit => -((value > 0.0) as i32),
        SignalKind::ShortExitInv => -((value < 0.0) as i32),
        SignalKind::ShortExitAny => -1,
    }
}

/// One registered signal: an indicator output line plus its
/// interpretation, applied to one data feed.
#[derive(Debug, Clone, Copy)]
pub struct SignalConfig {
    pub id: IndicatorId,
    pub line: usize,
    pub kind: SignalKind,
    pub feed: usize,
}

/// A set of signals queried together each bar.
#[derive(Debug, Default)]
pub struct SignalGroup {
    signals: Vec<SignalConfig>,
}

impl SignalGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: IndicatorId, kind: SignalKind) {
        self.add_for(id, 0, kind, 0);
    }

    pub fn add_for(&mut self, id: IndicatorId, line: usize, kind: SignalKind, feed: usize) {
        self.signals.push(SignalConfig {
            id,
            line,
            kind,
            feed,
        });
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn signals(&self) -> &[SignalConfig] {
        &self.signals
    }

    fn any(&self, read: &impl Fn(IndicatorId, usize) -> f64, pred: impl Fn(&SignalConfig, i32) -> bool) -> bool {
        self.signals.iter().any(|cfg| {
            let v = evaluate(read(cfg.id, cfg.line), cfg.kind);
            pred(cfg, v)
        })
    }

    pub fn has_long_entry(&self, read: impl Fn(IndicatorId, usize) -> f64) -> bool {
        self.any(&read, |cfg, v| cfg.kind.is_long_entry() && v > 0)
    }

    pub fn has_short_entry(&self, read: impl Fn(IndicatorId, usize) -> f64) -> bool {
        self.any(&read, |cfg, v| cfg.kind.is_short_entry() && v < 0)
    }

    pub fn has_long_exit(&self, read: impl Fn(IndicatorId, usize) -> f64) -> bool {
        self.any(&read, |cfg, v| cfg.kind.is_long_exit() && v != 0)
    }

    pub fn has_short_exit(&self, read: impl Fn(IndicatorId, usize) -> f64) -> bool {
        self.any(&read, |cfg, v| cfg.kind.is_short_exit() && v != 0)
    }
}

/// Which directions a signal strategy may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalPolicy {
    #[default]
    LongShort,
    LongOnly,
    ShortOnly,
}

type SignalSetup = Box<dyn FnOnce(&mut SetupCtx, &mut SignalGroup) + Send>;

/// A strategy driven entirely by registered signals.
///
/// Exits are evaluated before entries; `exit_on_opposite` makes an
/// opposing entry first flatten the current position. When long and short
/// fire together on a flat book, long wins.
pub struct SignalStrategy {
    pub policy: SignalPolicy,
    pub exit_on_opposite: bool,
    group: SignalGroup,
    setup: Option<SignalSetup>,
}

impl SignalStrategy {
    pub fn new<F>(policy: SignalPolicy, setup: F) -> Self
    where
        F: FnOnce(&mut SetupCtx, &mut SignalGroup) + Send + 'static,
    {
        Self {
            policy,
            exit_on_opposite: true,
            group: SignalGroup::new(),
            setup: Some(Box::new(setup)),
        }
    }

    pub fn group(&self) -> &SignalGroup {
        &self.group
    }
}

impl Strategy for SignalStrategy {
    fn on_start(&mut self, ctx: &mut SetupCtx) {
        if let Some(setup) = self.setup.take() {
            setup(ctx, &mut self.group);
        }
    }

    fn next(&mut self, ctx: &mut Ctx) {
        let mut pos = ctx.position(0);

        let (long_exit, short_exit, long_entry, short_entry) = {
            let read = |id: IndicatorId, line: usize| ctx.ind_line(id, line, 0);
            (
                self.group.has_long_exit(read),
                self.group.has_short_exit(read),
                self.group.has_long_entry(read),
                self.group.has_short_entry(read),
            )
        };

        // Exits come first.
        if pos > 0.0 && long_exit {
            ctx.close_position(0);
            pos = 0.0;
        } else if pos < 0.0 && short_exit {
            ctx.close_position(0);
            pos = 0.0;
        }

        let can_long = self.policy != SignalPolicy::ShortOnly;
        let can_short = self.policy != SignalPolicy::LongOnly;
        let mut long = can_long && long_entry;
        let mut short = can_short && short_entry;

        if long && short {
            if pos > 0.0 {
                long = false; // already long
            } else if pos < 0.0 {
                short = false; // already short
            } else {
                short = false; // flat: long wins
            }
        }

        if long {
            if pos < 0.0 && self.exit_on_opposite {
                ctx.close_position(0);
                pos = 0.0;
            }
            if pos <= 0.0 {
                ctx.buy(0, 0.0);
            }
        }
        if short {
            if pos > 0.0 && self.exit_on_opposite {
                ctx.close_position(0);
                pos = 0.0;
            }
            if pos >= 0.0 {
                ctx.sell(0, 0.0);
            }
        }
    }
}
