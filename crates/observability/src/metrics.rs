//! 遥测管道指标
//!
//! 记录队列与分发 worker 自身的运行状况 (不是被转发的业务指标)。

use metrics::{counter, gauge, histogram};

/// 记录一次成功入队
pub fn record_enqueued(dedupe: bool) {
    let mode = if dedupe { "once" } else { "always" };
    counter!("telemetry_relay_enqueued_total", "mode" => mode).increment(1);
}

/// 记录一次被 "log once" 规则丢弃的入队
pub fn record_deduplicated() {
    counter!("telemetry_relay_deduplicated_total").increment(1);
}

/// 记录队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("telemetry_relay_queue_depth").set(depth as f64);
}

/// 记录一次批量投递
///
/// 失败的批次不会重试，按 `lost` 计数。
pub fn record_batch_delivered(sink_name: &str, batch_len: usize, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "telemetry_relay_batches_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!("telemetry_relay_batch_size", "sink" => sink_name.to_string())
        .record(batch_len as f64);

    if success {
        counter!("telemetry_relay_metrics_delivered_total", "sink" => sink_name.to_string())
            .increment(batch_len as u64);
    } else {
        counter!("telemetry_relay_metrics_lost_total", "sink" => sink_name.to_string())
            .increment(batch_len as u64);
    }
}

/// 记录 worker 启动
pub fn record_worker_started() {
    gauge!("telemetry_relay_workers_running").increment(1.0);
}

/// 记录 worker 退出
pub fn record_worker_stopped() {
    gauge!("telemetry_relay_workers_running").decrement(1.0);
}
