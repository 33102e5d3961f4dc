// Envelope - Linear ADSR amplitude shaping for instrument voices
//
// Every stage is a straight line from the level the stage started at, so a
// retrigger or an early release never jumps. Release always lands on exactly
// 0.0 and the envelope goes idle, which lets a track fall fully silent.

/// ADSR times in seconds and sustain level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParams {
    pub attack: f32,
    pub decay: f32,
    /// 0.0 - 1.0; presets with 0.0 are percussive
    pub sustain: f32,
    pub release: f32,
}

const MIN_STAGE_SECONDS: f32 = 0.001;
const MAX_STAGE_SECONDS: f32 = 5.0;

impl AdsrParams {
    /// Build parameters, clamping times to 1 ms - 5 s and sustain to 0 - 1
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        let time = |t: f32| t.clamp(MIN_STAGE_SECONDS, MAX_STAGE_SECONDS);
        Self {
            attack: time(attack),
            decay: time(decay),
            sustain: sustain.clamp(0.0, 1.0),
            release: time(release),
        }
    }
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self::new(0.02, 0.1, 0.3, 0.4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

pub struct AdsrEnvelope {
    params: AdsrParams,
    sample_rate: f32,
    stage: Stage,
    level: f32,
    /// Level when the current stage began
    from: f32,
    /// Samples spent in the current stage
    elapsed: f32,
}

impl AdsrEnvelope {
    pub fn new(params: AdsrParams, sample_rate: f32) -> Self {
        Self {
            params,
            sample_rate,
            stage: Stage::Idle,
            level: 0.0,
            from: 0.0,
            elapsed: 0.0,
        }
    }

    /// Swap in a new preset's shape; a running stage continues with it
    pub fn set_params(&mut self, params: AdsrParams) {
        self.params = params;
    }

    /// Start (or retrigger) from the current level
    pub fn note_on(&mut self) {
        self.enter(Stage::Attack);
    }

    pub fn note_off(&mut self) {
        if self.stage != Stage::Idle {
            self.enter(Stage::Release);
        }
    }

    /// Advance one sample and return the new level
    pub fn process(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => self.level = 0.0,
            Stage::Sustain => self.level = self.params.sustain,
            Stage::Attack => {
                if self.ramp(self.params.attack, 1.0) {
                    self.enter(Stage::Decay);
                    self.level = 1.0;
                }
            }
            Stage::Decay => {
                let sustain = self.params.sustain;
                if self.ramp(self.params.decay, sustain) {
                    self.enter(Stage::Sustain);
                    self.level = sustain;
                }
            }
            Stage::Release => {
                if self.ramp(self.params.release, 0.0) {
                    self.enter(Stage::Idle);
                    self.level = 0.0;
                }
            }
        }
        self.level
    }

    /// Move one sample along the line from `self.from` to `target`;
    /// true once the stage has run its full length
    fn ramp(&mut self, seconds: f32, target: f32) -> bool {
        let length = (seconds * self.sample_rate).max(1.0);
        let progress = (self.elapsed / length).min(1.0);
        self.level = self.from + (target - self.from) * progress;
        self.elapsed += 1.0;
        self.elapsed >= length
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.from = self.level;
        self.elapsed = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    pub fn is_releasing(&self) -> bool {
        self.stage == Stage::Release
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Silence immediately (voice stealing, transport stop)
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
        self.from = 0.0;
        self.elapsed = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48000.0;

    fn run(envelope: &mut AdsrEnvelope, samples: usize) {
        for _ in 0..samples {
            envelope.process();
        }
    }

    #[test]
    fn test_params_clamped() {
        let params = AdsrParams::new(-1.0, 10.0, 1.5, 0.0001);
        assert_eq!(params.attack, 0.001);
        assert_eq!(params.decay, 5.0);
        assert_eq!(params.sustain, 1.0);
        assert_eq!(params.release, 0.001);
    }

    #[test]
    fn test_idle_until_note_on() {
        let mut envelope = AdsrEnvelope::new(AdsrParams::default(), SAMPLE_RATE);
        assert!(!envelope.is_active());
        assert_eq!(envelope.process(), 0.0);
    }

    #[test]
    fn test_attack_reaches_full_level() {
        let params = AdsrParams::new(0.01, 0.1, 0.7, 0.2);
        let mut envelope = AdsrEnvelope::new(params, SAMPLE_RATE);
        envelope.note_on();
        assert_eq!(envelope.stage, Stage::Attack);

        run(&mut envelope, (0.01 * SAMPLE_RATE) as usize);
        assert_eq!(envelope.stage, Stage::Decay);
        assert_eq!(envelope.level(), 1.0);
    }

    #[test]
    fn test_decay_settles_on_sustain() {
        let params = AdsrParams::new(0.001, 0.01, 0.5, 0.1);
        let mut envelope = AdsrEnvelope::new(params, SAMPLE_RATE);
        envelope.note_on();
        run(&mut envelope, 2000);

        assert_eq!(envelope.stage, Stage::Sustain);
        assert_eq!(envelope.level(), 0.5);
    }

    #[test]
    fn test_release_is_linear_and_ends_at_zero() {
        let params = AdsrParams::new(0.001, 0.001, 0.5, 0.01);
        let mut envelope = AdsrEnvelope::new(params, SAMPLE_RATE);
        envelope.note_on();
        run(&mut envelope, 1000);

        envelope.note_off();
        assert!(envelope.is_releasing());

        let release_samples = (0.01 * SAMPLE_RATE) as usize;
        run(&mut envelope, release_samples / 2);
        assert!((envelope.level() - 0.25).abs() < 0.01);

        run(&mut envelope, release_samples);
        assert!(!envelope.is_active());
        assert_eq!(envelope.process(), 0.0);
    }

    #[test]
    fn test_percussive_shape_waits_for_note_off() {
        let params = AdsrParams::new(0.001, 0.3, 0.0, 0.1);
        let mut envelope = AdsrEnvelope::new(params, SAMPLE_RATE);
        envelope.note_on();
        run(&mut envelope, 48000);
        assert_eq!(envelope.level(), 0.0);
        assert!(envelope.is_active());

        envelope.note_off();
        run(&mut envelope, 10000);
        assert!(!envelope.is_active());
    }

    #[test]
    fn test_retrigger_continues_from_current_level() {
        let params = AdsrParams::new(0.01, 0.01, 0.5, 0.05);
        let mut envelope = AdsrEnvelope::new(params, SAMPLE_RATE);
        envelope.note_on();
        run(&mut envelope, 2000);

        envelope.note_on();
        assert_eq!(envelope.stage, Stage::Attack);
        assert!(envelope.process() >= 0.5);
    }
}
