use crate::{RecorderConfig, config::DISPLAY_ID};

use std::{path::Path, time::Duration};

const THREAD_QUEUE_SIZE: u32 = 4096;

/// ffmpeg command line capturing pulse audio and the virtual display into `out_path`.
///
/// Progress is written to the unix socket at `progress_socket` every `progress_period`.
pub(crate) fn transcoder_args(
    cfg: &RecorderConfig,
    out_path: &Path,
    progress_socket: &Path,
    progress_period: Duration,
) -> String {
    format!(
        "-y -thread_queue_size {queue} -f pulse -i default \
         -r {frame_rate} -thread_queue_size {queue} -f x11grab -draw_mouse 0 -s {width}x{height} -i :{display} \
         -c:v h264 -preset {preset} -vf format=yuv420p -b:v {video_rate}k -b:a {audio_rate}k \
         -movflags +faststart -nostats -stats_period {period} -progress unix://{socket} {out}",
        queue = THREAD_QUEUE_SIZE,
        frame_rate = cfg.frame_rate,
        width = cfg.width,
        height = cfg.height,
        display = DISPLAY_ID,
        preset = cfg.video_preset,
        video_rate = cfg.video_rate,
        audio_rate = cfg.audio_rate,
        period = progress_period.as_secs_f64(),
        socket = progress_socket.display(),
        out = out_path.display(),
    )
}
