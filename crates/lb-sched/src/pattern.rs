//! Step-pattern language.
//!
//! One lane per line, one event per step:
//!
//! ```text
//! # four on the floor with a hat on the offbeat
//! let hh = hat;lvl=0.4;pos=0.6
//! cyc >> bd ~ sn ~
//! ~ hh ~ hh @lvl: cyc >> 0.4 0.2
//! rnd >> sine;freq=220 sine;freq=330 ~
//! @pos: bounce >> -1 1 16
//! learn >> bd bd sn ~ bd hh sn ~
//! ```
//!
//! A step is `~` (rest), a variable, or `name;param=value;...`. `sine`, `saw`,
//! `sqr` and `osc` select synths, `wt:ID` a wavetable over sample `ID`, and
//! any other name is a sample played by the sampler. Lanes are `cyc` (the
//! default), `rnd` or `learn`. Parameter sequences (`@param: gen >> values`)
//! follow a lane on the same line or on the lines after it, and override
//! fixed values. They advance once per sounding step.
//!
//! `rnd` and `learn` are seeded per lane, so the same text always yields the
//! same events for a window.

use std::collections::HashMap;
use std::str::FromStr;

use lb_ir::{Event, ParamLabel, SampleId, SourceType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EvalError;
use crate::learn::{Markov, MAX_ORDER};
use crate::loop_spec::{Evaluator, LoopSpec, PatternEvent};
use crate::syntax::{self, EventSyntax, Line, SeqSyntax};

/// Evaluator for the step-pattern language.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepEvaluator;

impl Evaluator for StepEvaluator {
    fn evaluate(&self, text: &str) -> Result<Box<dyn LoopSpec>, EvalError> {
        Ok(Box::new(text.parse::<StepPattern>()?))
    }
}

/// Short names accepted for parameters, besides the canonical ones.
const PARAM_ALIASES: &[(&str, ParamLabel)] = &[
    ("atk", ParamLabel::Attack),
    ("dec", ParamLabel::Decay),
    ("del", ParamLabel::DelayMix),
    ("dur", ParamLabel::Duration),
    ("freq", ParamLabel::PitchFrequency),
    ("note", ParamLabel::PitchNote),
    ("lvl", ParamLabel::Level),
    ("pw", ParamLabel::Pulsewidth),
    ("rate", ParamLabel::PlaybackRate),
    ("start", ParamLabel::PlaybackStart),
    ("loop", ParamLabel::PlaybackLoop),
    ("rel", ParamLabel::Release),
    ("rev", ParamLabel::ReverbMix),
    ("pos", ParamLabel::StereoPosition),
    ("sus", ParamLabel::Sustain),
];

/// Upper bound for `ramp` and `bounce` steps.
pub const MAX_STEPS: u64 = u32::MAX as u64;

const RANDOM_SEED: u64 = 0x6c62_272e_07bb_0142;
const LEARN_SEED: u64 = 0x2545_f491_4f6c_dd1d;

/// Cycles of the source sequence a learned tape covers.
const LEARN_CYCLES: usize = 16;
const MIN_TAPE: usize = 64;

/// Resolve a short or canonical parameter name.
pub fn param_label(name: &str) -> Option<ParamLabel> {
    PARAM_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, label)| *label)
        .or_else(|| ParamLabel::from_name(name))
}

/// Seed derivation for per-step random picks.
fn mix(seed: u64, n: u64) -> u64 {
    // splitmix64 finalizer
    let mut z = seed ^ n.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Index in `0..len` picked by a generator seeded for step `n`.
fn pick(seed: u64, n: u64, len: usize) -> usize {
    StdRng::seed_from_u64(mix(seed, n)).gen_range(0..len)
}

/// Train on `items` and draw a tape of indices into it.
fn learned<T: PartialEq>(items: &[T], seed: u64) -> Vec<usize> {
    let symbols: Vec<usize> = items
        .iter()
        .map(|x| items.iter().position(|y| y == x).unwrap_or(0))
        .collect();
    let len = (items.len() * LEARN_CYCLES).max(MIN_TAPE);
    Markov::learn(&symbols, MAX_ORDER).generate(len, &mut StdRng::seed_from_u64(seed))
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Order {
    Cycle,
    /// Independent pick per step, so a window always yields the same events.
    Random(u64),
    /// Step indices drawn from a model of the lane, repeating after the tape.
    Learn(Vec<usize>),
}

#[derive(Clone, Debug, PartialEq)]
enum ValueSeq {
    Cycle(Vec<f32>),
    Random { values: Vec<f32>, seed: u64 },
    Learned(Vec<f32>),
    Ramp { min: f32, inc: f32, steps: u64 },
    Bounce { min: f32, range: f32, steps: u64 },
}

impl ValueSeq {
    fn value(&self, k: u64) -> f32 {
        match self {
            ValueSeq::Cycle(values) | ValueSeq::Learned(values) => {
                values[(k % values.len() as u64) as usize]
            }
            ValueSeq::Random { values, seed } => values[pick(*seed, k, values.len())],
            ValueSeq::Ramp { min, inc, steps } => min + (k % (steps + 1)) as f32 * inc,
            ValueSeq::Bounce { min, range, steps } => {
                let degrees = (360.0 / *steps as f32) * (k % steps) as f32;
                min + degrees.to_radians().sin().abs() * range
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct ParamSeq {
    label: ParamLabel,
    values: ValueSeq,
}

#[derive(Clone, Debug, PartialEq)]
struct Lane {
    order: Order,
    steps: Vec<Option<Event>>,
    /// `hits[i]`: sounding steps before step `i` of one cycle.
    hits: Vec<u64>,
    params: Vec<ParamSeq>,
}

impl Lane {
    fn new(order: Order, steps: Vec<Option<Event>>) -> Self {
        let mut hits = Vec::with_capacity(steps.len() + 1);
        let mut count = 0;
        for step in &steps {
            hits.push(count);
            count += u64::from(step.is_some());
        }
        hits.push(count);
        Self {
            order,
            steps,
            hits,
            params: Vec::new(),
        }
    }

    /// Event at absolute step `n`, with parameter sequences applied.
    fn event_at(&self, n: u64) -> Option<Event> {
        let len = self.steps.len() as u64;
        let (index, hit) = match &self.order {
            Order::Cycle => {
                let i = (n % len) as usize;
                let per_cycle = self.hits[self.steps.len()];
                (i, (n / len) * per_cycle + self.hits[i])
            }
            Order::Random(seed) => (pick(*seed, n, self.steps.len()), n),
            Order::Learn(tape) => (*tape.get((n % tape.len().max(1) as u64) as usize)?, n),
        };
        let mut event = self.steps.get(index)?.clone()?;
        for seq in &self.params {
            event.params.set(seq.label, seq.values.value(hit));
        }
        Some(event)
    }
}

/// An evaluated step pattern: independent lanes sharing one step grid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepPattern {
    lanes: Vec<Lane>,
}

impl StepPattern {
    pub fn lanes(&self) -> usize {
        self.lanes.len()
    }
}

impl LoopSpec for StepPattern {
    fn query(&self, from: f64, to: f64, out: &mut Vec<PatternEvent>) {
        if self.lanes.is_empty() || !(to > from) || !to.is_finite() {
            return;
        }
        let mut n = from.max(0.0).ceil() as u64;
        while (n as f64) < to {
            for lane in &self.lanes {
                if let Some(event) = lane.event_at(n) {
                    out.push(PatternEvent {
                        position: n as f64,
                        event,
                    });
                }
            }
            n += 1;
        }
    }

    fn is_empty(&self) -> bool {
        self.lanes.iter().all(|l| l.hits[l.steps.len()] == 0)
    }
}

impl FromStr for StepPattern {
    type Err = EvalError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut lines = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let src = raw.split('#').next().unwrap_or("").trim();
            if src.is_empty() {
                continue;
            }
            let parsed = syntax::line(src).map_err(|reason| EvalError::malformed(i + 1, reason))?;
            lines.push((i + 1, parsed));
        }
        Builder::default().build(&lines)
    }
}

#[derive(Default)]
struct Builder {
    variables: HashMap<String, Event>,
    lanes: Vec<Lane>,
}

impl Builder {
    fn build(mut self, lines: &[(usize, Line<'_>)]) -> Result<StepPattern, EvalError> {
        // Variables may be used before the line that defines them.
        for (line, parsed) in lines {
            if let Line::Let { name, event } = parsed {
                let event = self
                    .event(*line, event)?
                    .ok_or_else(|| EvalError::malformed(*line, "a variable cannot be a rest"))?;
                self.variables.insert(name.to_string(), event);
            }
        }
        for (line, parsed) in lines {
            match parsed {
                Line::Let { .. } => {}
                Line::Lane {
                    generator,
                    steps,
                    params,
                } => {
                    let lane = self.lane(*line, *generator, steps)?;
                    self.lanes.push(lane);
                    self.extend_last(*line, params)?;
                }
                Line::Params(params) => {
                    if self.lanes.is_empty() {
                        return Err(EvalError::malformed(
                            *line,
                            "parameter sequence before any pattern line",
                        ));
                    }
                    self.extend_last(*line, params)?;
                }
            }
        }
        Ok(StepPattern { lanes: self.lanes })
    }

    fn lane(
        &self,
        line: usize,
        generator: Option<&str>,
        steps: &[EventSyntax<'_>],
    ) -> Result<Lane, EvalError> {
        let steps = steps
            .iter()
            .map(|step| self.event(line, step))
            .collect::<Result<Vec<_>, _>>()?;
        let lane = self.lanes.len() as u64;
        let order = match generator.unwrap_or("cyc") {
            "cyc" => Order::Cycle,
            "rnd" => Order::Random(mix(RANDOM_SEED, lane)),
            "learn" => Order::Learn(learned(&steps, mix(LEARN_SEED, lane))),
            other => return Err(unknown_generator(line, other)),
        };
        Ok(Lane::new(order, steps))
    }

    /// Attach sequences to the most recent lane.
    fn extend_last(&mut self, line: usize, params: &[SeqSyntax<'_>]) -> Result<(), EvalError> {
        let index = self.lanes.len() as u64;
        let Some(lane) = self.lanes.last_mut() else {
            return Ok(());
        };
        for seq in params {
            let seed = mix(index, lane.params.len() as u64 + 1);
            let values = value_seq(line, seq, seed)?;
            // Unknown parameters are skipped, not rejected.
            if let Some(label) = param_label(seq.param) {
                lane.params.push(ParamSeq { label, values });
            }
        }
        Ok(())
    }

    /// Resolve one step. `None` is a rest.
    fn event(&self, line: usize, step: &EventSyntax<'_>) -> Result<Option<Event>, EvalError> {
        if step.is_rest() {
            return Ok(None);
        }
        let mut event = match self.variables.get(step.name) {
            Some(template) => template.clone(),
            None => new_event(line, step.name)?,
        };
        for &(key, value) in &step.params {
            let value = finite(line, value)?;
            if let Some(label) = param_label(key) {
                event.params.set(label, value);
            }
        }
        Ok(Some(event))
    }
}

fn unknown_generator(line: usize, name: &str) -> EvalError {
    EvalError::UnknownGenerator {
        line,
        name: name.to_string(),
    }
}

fn new_event(line: usize, name: &str) -> Result<Event, EvalError> {
    let synth = match name {
        "sine" => Some(SourceType::SineSynth),
        "saw" => Some(SourceType::LFSawSynth),
        "sqr" => Some(SourceType::LFSquareSynth),
        "osc" => Some(SourceType::SineOsc),
        _ => None,
    };
    if let Some(source) = synth {
        return Ok(Event::new(source, 0.0));
    }
    let (source, id) = match name.strip_prefix("wt:") {
        Some(id) => (SourceType::Wavetable, id),
        None => (SourceType::Sampler, name),
    };
    let id = SampleId::new(id).map_err(|e| EvalError::malformed(line, e.to_string()))?;
    Ok(Event::new(source, 0.0).with_sample(id))
}

fn finite(line: usize, value: f32) -> Result<f32, EvalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::malformed(line, format!("`{value}` is not a finite number")))
    }
}

fn value_seq(line: usize, seq: &SeqSyntax<'_>, seed: u64) -> Result<ValueSeq, EvalError> {
    let values = seq
        .values
        .iter()
        .map(|v| finite(line, *v))
        .collect::<Result<Vec<_>, _>>()?;
    let generator = seq.generator.unwrap_or("cyc");
    Ok(match generator {
        "cyc" => ValueSeq::Cycle(values),
        "rnd" => ValueSeq::Random { values, seed },
        "learn" => {
            let tape = learned(&values, seed);
            ValueSeq::Learned(tape.into_iter().map(|i| values[i]).collect())
        }
        "ramp" | "bounce" => {
            let [min, max, steps] = values[..] else {
                return Err(EvalError::malformed(
                    line,
                    format!("`{generator}` takes min, max and steps"),
                ));
            };
            if steps < 1.0 || steps.fract() != 0.0 || steps as u64 > MAX_STEPS {
                return Err(EvalError::malformed(
                    line,
                    format!("steps must be a whole number from 1 to {MAX_STEPS}, got {steps}"),
                ));
            }
            let steps = steps as u64;
            if generator == "ramp" {
                ValueSeq::Ramp {
                    min,
                    inc: (max - min) / steps as f32,
                    steps,
                }
            } else {
                ValueSeq::Bounce {
                    min,
                    range: max - min,
                    steps,
                }
            }
        }
        other => return Err(unknown_generator(line, other)),
    })
}
