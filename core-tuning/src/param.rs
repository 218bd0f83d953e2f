//! Sample-accurate parameter automation.
//!
//! An [`AudioParam`] holds a timeline of automation events in seconds on the
//! render clock. Ramps interpolate from the previous event's time and value
//! to their own. Exponential ramps hold the previous value when either end is
//! zero or the ends differ in sign.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    SetValue { time: f64, value: f32 },
    LinearRamp { time: f64, value: f32 },
    ExponentialRamp { time: f64, value: f32 },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { time, .. }
            | Automation::LinearRamp { time, .. }
            | Automation::ExponentialRamp { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            Automation::SetValue { value, .. }
            | Automation::LinearRamp { value, .. }
            | Automation::ExponentialRamp { value, .. } => value,
        }
    }

    /// Value at `t` while ramping towards this event from `(from_time, from_value)`.
    fn interpolate(&self, from_time: f64, from_value: f32, t: f64) -> f32 {
        let span = self.time() - from_time;
        if span <= 0.0 {
            return self.value();
        }
        let progress = ((t - from_time) / span).clamp(0.0, 1.0);

        match *self {
            Automation::SetValue { .. } => from_value,
            Automation::LinearRamp { value, .. } => {
                from_value + (value - from_value) * progress as f32
            }
            Automation::ExponentialRamp { value, .. } => {
                if from_value == 0.0 || value == 0.0 || (from_value < 0.0) != (value < 0.0) {
                    from_value
                } else {
                    from_value * (value / from_value).powf(progress as f32)
                }
            }
        }
    }

    fn is_ramp(&self) -> bool {
        !matches!(self, Automation::SetValue { .. })
    }
}

#[derive(Debug, Clone)]
pub struct AudioParam {
    default_value: f32,
    events: Vec<Automation>,
    // Render cursor: events before `cursor` are in the past.
    cursor: usize,
    anchor: (f64, f32),
    last_value: f32,
}

impl AudioParam {
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            events: Vec::new(),
            cursor: 0,
            anchor: (0.0, default_value),
            last_value: default_value,
        }
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Automation::SetValue { time, value })
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Automation::LinearRamp { time, value })
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Automation::ExponentialRamp { time, value })
    }

    /// Remove every event at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) -> &mut Self {
        self.events.retain(|event| event.time() < time);
        self.rewind();
        self
    }

    /// Cancel from `time` on and pin the value the timeline had at `time`.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) -> &mut Self {
        let held = self.value_at(time);
        self.cancel_scheduled_values(time);
        self.set_value_at_time(held, time)
    }

    /// Value most recently produced by [`AudioParam::next_value`].
    pub fn value(&self) -> f32 {
        self.last_value
    }

    pub fn scheduled_events(&self) -> usize {
        self.events.len()
    }

    /// Evaluate the timeline at `t` without touching the render cursor.
    pub fn value_at(&self, t: f64) -> f32 {
        let mut anchor = (0.0, self.default_value);
        for event in &self.events {
            if event.time() <= t {
                anchor = (event.time(), event.value());
                continue;
            }
            if event.is_ramp() {
                return event.interpolate(anchor.0, anchor.1, t);
            }
            break;
        }
        anchor.1
    }

    /// Evaluate at `t` for rendering. `t` must not decrease between calls
    /// unless the timeline was edited in between.
    pub fn next_value(&mut self, t: f64) -> f32 {
        while let Some(event) = self.events.get(self.cursor) {
            if event.time() > t {
                break;
            }
            self.anchor = (event.time(), event.value());
            self.cursor += 1;
        }

        let value = match self.events.get(self.cursor) {
            Some(event) if event.is_ramp() => event.interpolate(self.anchor.0, self.anchor.1, t),
            _ => self.anchor.1,
        };
        self.last_value = value;
        value
    }

    fn insert(&mut self, event: Automation) -> &mut Self {
        let index = self
            .events
            .partition_point(|existing| existing.time() <= event.time());
        self.events.insert(index, event);
        self.rewind();
        self
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.anchor = (0.0, self.default_value);
    }
}
