use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::session::EndReason;

const MAX_LATENCY_RECORDS: usize = 1000;
const RECENT_LATENCIES: usize = 20;

/// マネージャー単位のローカルメトリクス
pub struct SpeechMetrics {
    counters: Mutex<MetricsCounters>,
    latencies: Mutex<Vec<LatencyRecord>>,
}

#[derive(Debug, Default)]
struct MetricsCounters {
    utterances_started: u64,
    utterances_completed: u64,
    utterances_failed: u64,
    sessions_started: u64,
    sessions_stopped: u64,
    sessions_ended_by_platform: u64,
    recognition_errors: u64,
    interim_transcripts: u64,
    final_transcripts: u64,
    accuracy_sum: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyRecord {
    pub duration_ms: u64,
    pub timestamp: String,
}

/// メトリクスサマリー（UIに返す用）
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub utterances_started: u64,
    pub utterances_completed: u64,
    pub utterances_failed: u64,
    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub sessions_ended_by_platform: u64,
    pub recognition_errors: u64,
    pub interim_transcripts: u64,
    pub final_transcripts: u64,
    /// 確定文字起こしの平均精度。未計測なら None。
    pub avg_accuracy: Option<f64>,
    pub avg_speak_latency_ms: Option<f64>,
    pub recent_speak_latencies: Vec<LatencyRecord>,
}

impl SpeechMetrics {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(MetricsCounters::default()),
            latencies: Mutex::new(Vec::new()),
        }
    }

    pub fn inc_utterances_started(&self) {
        self.counters.lock().utterances_started += 1;
    }

    pub fn inc_utterances_completed(&self) {
        self.counters.lock().utterances_completed += 1;
    }

    pub fn inc_utterances_failed(&self) {
        self.counters.lock().utterances_failed += 1;
    }

    pub fn inc_sessions_started(&self) {
        self.counters.lock().sessions_started += 1;
    }

    pub fn record_session_end(&self, reason: EndReason) {
        let mut c = self.counters.lock();
        match reason {
            EndReason::Stopped => c.sessions_stopped += 1,
            EndReason::PlatformEnd => c.sessions_ended_by_platform += 1,
            EndReason::Error => c.recognition_errors += 1,
        }
    }

    pub fn inc_interim_transcripts(&self) {
        self.counters.lock().interim_transcripts += 1;
    }

    pub fn record_final_transcript(&self, accuracy: f64) {
        let mut c = self.counters.lock();
        c.final_transcripts += 1;
        c.accuracy_sum += accuracy;
    }

    pub fn record_speak_latency(&self, duration_ms: u64) {
        let record = LatencyRecord {
            duration_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let mut latencies = self.latencies.lock();
        latencies.push(record);
        if latencies.len() > MAX_LATENCY_RECORDS {
            let excess = latencies.len() - MAX_LATENCY_RECORDS;
            latencies.drain(0..excess);
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let c = self.counters.lock();
        let latencies = self.latencies.lock();

        let avg_speak_latency_ms = if latencies.is_empty() {
            None
        } else {
            Some(
                latencies.iter().map(|r| r.duration_ms as f64).sum::<f64>()
                    / latencies.len() as f64,
            )
        };

        let avg_accuracy = if c.final_transcripts == 0 {
            None
        } else {
            Some(c.accuracy_sum / c.final_transcripts as f64)
        };

        MetricsSummary {
            utterances_started: c.utterances_started,
            utterances_completed: c.utterances_completed,
            utterances_failed: c.utterances_failed,
            sessions_started: c.sessions_started,
            sessions_stopped: c.sessions_stopped,
            sessions_ended_by_platform: c.sessions_ended_by_platform,
            recognition_errors: c.recognition_errors,
            interim_transcripts: c.interim_transcripts,
            final_transcripts: c.final_transcripts,
            avg_accuracy,
            avg_speak_latency_ms,
            recent_speak_latencies: latencies.iter().rev().take(RECENT_LATENCIES).cloned().collect(),
        }
    }
}

impl Default for SpeechMetrics {
    fn default() -> Self {
        Self::new()
    }
}
