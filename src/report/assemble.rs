use super::*;
use crate::config::Config;
use crate::harmony::HarmonicResult;
use crate::metrics::MetricResult;
use crate::pipeline::AnalysisOptions;

/// Percussive content needed to include transients without `--detailed`.
const MIN_TRANSIENT_DENSITY: f32 = 0.5;
const MIN_PERCUSSION_ENERGY: f32 = 10.0;

/// Outputs of every analysis stage, joined before assembly.
#[derive(Clone, Debug)]
pub struct ModuleResults {
    pub frequency_balance: MetricResult,
    pub dynamic_range: MetricResult,
    pub stereo_field: MetricResult,
    pub clarity: MetricResult,
    pub transients: MetricResult,
    pub harmony: HarmonicResult,
}

pub fn assemble(results: &ModuleResults, options: &AnalysisOptions, config: &Config) -> AnalysisReport {
    let limit = if options.detailed {
        usize::MAX
    } else {
        config.report.brief_note_limit
    };
    let notes = |r: &MetricResult| r.notes.iter().take(limit).cloned().collect::<Vec<_>>();

    let fb = &results.frequency_balance;
    let frequency_balance = FrequencyBalanceReport {
        balance_score: round2(fb.score),
        band_energy: BandEnergyReport {
            sub_bass: round2(fb.stat("sub_bass")),
            bass: round2(fb.stat("bass")),
            low_mid: round2(fb.stat("low_mid")),
            mid: round2(fb.stat("mid")),
            high_mid: round2(fb.stat("high_mid")),
            high: round2(fb.stat("high")),
            air: round2(fb.stat("air")),
        },
        analysis: notes(fb),
    };

    let dr = &results.dynamic_range;
    let dynamic_range = DynamicRangeReport {
        dynamic_range_score: round2(dr.score),
        dynamic_range_db: round2(dr.stat("dynamic_range_db")),
        crest_factor_db: round2(dr.stat("crest_factor_db")),
        plr: round2(dr.stat("plr")),
        analysis: notes(dr),
    };

    let sf = &results.stereo_field;
    let stereo_field = StereoFieldReport {
        width_score: round2(sf.score),
        phase_score: round2(sf.stat("phase_score")),
        correlation: round3(sf.stat("correlation")),
        mid_ratio: round3(sf.stat("mid_ratio")),
        side_ratio: round3(sf.stat("side_ratio")),
        analysis: notes(sf),
    };

    let cl = &results.clarity;
    let clarity = ClarityReport {
        clarity_score: round2(cl.score),
        spectral_contrast: round2(cl.stat("spectral_contrast")),
        spectral_flatness: round3(cl.stat("spectral_flatness")),
        spectral_centroid: round2(cl.stat("spectral_centroid")),
        analysis: notes(cl),
    };

    let tr = &results.transients;
    let percussive = tr.stat("transient_density") >= MIN_TRANSIENT_DENSITY
        && tr.stat("percussion_energy") >= MIN_PERCUSSION_ENERGY;
    let transients = (options.detailed || percussive).then(|| TransientsReport {
        transients_score: round2(tr.score),
        attack_time: round2(tr.stat("attack_time")),
        transient_density: round2(tr.stat("transient_density")),
        percussion_energy: round2(tr.stat("percussion_energy")),
        analysis: notes(tr),
    });

    AnalysisReport {
        success: true,
        error: None,
        processing_time: None,
        frequency_balance: Some(frequency_balance),
        dynamic_range: Some(dynamic_range),
        stereo_field: Some(stereo_field),
        clarity: Some(clarity),
        transients,
        harmonic_content: Some(harmonic_section(&results.harmony, options.detailed)),
    }
}

fn harmonic_section(h: &HarmonicResult, detailed: bool) -> HarmonicContentReport {
    let analysis = if detailed {
        h.notes.clone()
    } else {
        h.notes.iter().take(1).cloned().collect()
    };

    let key_relationships = h.key.filter(|_| detailed).map(|k| KeyRelationships {
        relative: k.relative().to_string(),
        parallel: k.parallel().to_string(),
        dominant: k.dominant().to_string(),
        subdominant: k.subdominant().to_string(),
    });

    let top_key_candidates = (detailed && !h.top_key_candidates.is_empty()).then(|| {
        h.top_key_candidates
            .iter()
            .map(|c| KeyCandidateReport {
                key: c.key.to_string(),
                confidence: round3(c.confidence),
            })
            .collect()
    });

    HarmonicContentReport {
        key: h.key_name(),
        harmonic_complexity: round2(h.harmonic_complexity.clamp(0.0, 100.0)),
        key_consistency: round2(h.key_consistency.clamp(0.0, 100.0)),
        chord_changes_per_minute: round2(h.chord_changes_per_minute.max(0.0)),
        analysis,
        key_relationships,
        top_key_candidates,
    }
}

fn round2(v: f32) -> f32 {
    if v.is_finite() {
        (v * 100.0).round() / 100.0
    } else {
        0.0
    }
}

fn round3(v: f32) -> f32 {
    if v.is_finite() {
        (v * 1000.0).round() / 1000.0
    } else {
        0.0
    }
}
