use std::fmt::Write as _;

/// Builder for the fixed audio-filter surface the codec tool consumes.
///
/// Filters are emitted in call order, comma-joined. An empty chain renders to
/// nothing and callers omit the `-af` argument entirely.
#[derive(Debug, Clone, Default)]
pub(crate) struct FilterChain {
    parts: Vec<String>,
}

impl FilterChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn trim(mut self, start_sec: f64, end_sec: f64) -> Self {
        self.push(format!("atrim=start={start_sec:.3}:end={end_sec:.3}"));
        self
    }

    /// Rebase timestamps after a trim so downstream fades see t=0.
    pub(crate) fn reset_pts(mut self) -> Self {
        self.push("asetpts=PTS-STARTPTS".to_string());
        self
    }

    pub(crate) fn volume_db(mut self, db: f64) -> Self {
        self.push(format!("volume={db:.2}dB"));
        self
    }

    pub(crate) fn fade_in(mut self, seconds: f64) -> Self {
        self.push(format!("afade=t=in:d={seconds:.3}"));
        self
    }

    pub(crate) fn fade_out(mut self, start_sec: f64, seconds: f64) -> Self {
        self.push(format!("afade=t=out:st={start_sec:.3}:d={seconds:.3}"));
        self
    }

    pub(crate) fn highpass(mut self, hz: u32) -> Self {
        self.push(format!("highpass=f={hz}"));
        self
    }

    pub(crate) fn lowpass(mut self, hz: u32) -> Self {
        self.push(format!("lowpass=f={hz}"));
        self
    }

    /// Tempo scaling; factors within 1% of unity are treated as native speed
    /// and emit nothing.
    pub(crate) fn atempo(mut self, factor: f64) -> Self {
        if factor > 0.0 && !(0.99..=1.01).contains(&factor) {
            self.push(format!("atempo={factor:.4}"));
        }
        self
    }

    pub(crate) fn loudnorm(mut self, integrated: f64, true_peak: f64, range: f64) -> Self {
        self.push(format!(
            "loudnorm=I={integrated}:TP={true_peak}:LRA={range}"
        ));
        self
    }

    pub(crate) fn limiter(mut self, limit: f64, attack_ms: u32, release_ms: u32) -> Self {
        self.push(format!(
            "alimiter=limit={limit:.2}:attack={attack_ms}:release={release_ms}:level=false"
        ));
        self
    }

    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{part}");
        }
        out
    }

    fn push(&mut self, part: String) {
        self.parts.push(part);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_chunk_chain_renders_in_order() {
        let chain = FilterChain::new()
            .trim(12.5, 190.0)
            .reset_pts()
            .volume_db(-1.7);
        assert_eq!(
            chain.render(),
            "atrim=start=12.500:end=190.000,asetpts=PTS-STARTPTS,volume=-1.70dB"
        );
    }

    #[test]
    fn fades_and_band_filters_use_the_fixed_names() {
        let chain = FilterChain::new()
            .highpass(300)
            .fade_out(42.0, 8.0)
            .fade_in(8.0)
            .lowpass(400);
        assert_eq!(
            chain.render(),
            "highpass=f=300,afade=t=out:st=42.000:d=8.000,afade=t=in:d=8.000,lowpass=f=400"
        );
    }

    #[test]
    fn near_unity_tempo_is_dropped() {
        assert!(FilterChain::new().atempo(1.0).is_empty());
        assert!(FilterChain::new().atempo(1.005).is_empty());
        assert_eq!(FilterChain::new().atempo(1.25).render(), "atempo=1.2500");
    }

    #[test]
    fn normalization_and_limiter_render_their_targets() {
        assert_eq!(
            FilterChain::new().loudnorm(-14.0, -1.5, 11.0).render(),
            "loudnorm=I=-14:TP=-1.5:LRA=11"
        );
        assert_eq!(
            FilterChain::new().limiter(0.89, 5, 50).render(),
            "alimiter=limit=0.89:attack=5:release=50:level=false"
        );
    }
}
