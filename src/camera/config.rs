//! Camera and stream configuration

use std::time::Duration;

/// Pixel format negotiated with the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Motion JPEG; each frame is a complete JPEG image
    #[default]
    Mjpeg,
    /// Uncompressed YUY2 4:2:2
    Yuy2,
}

/// Immutable description of the requested video stream.
///
/// Supplied once at startup and passed by value to the pipeline
/// constructor; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Horizontal resolution
    pub width: u32,

    /// Vertical resolution
    pub height: u32,

    /// Requested frame rate
    pub fps: u32,

    /// Pixel format
    pub format: PixelFormat,

    /// Number of driver-owned frame buffers (triple buffering by default)
    pub frame_buffers: usize,

    /// Size of each frame buffer in bytes
    pub frame_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 20,
            format: PixelFormat::Mjpeg,
            frame_buffers: 3,
            frame_size: 512 * 1024,
        }
    }
}

impl StreamConfig {
    /// Set the requested resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the requested frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the pixel format
    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the number of frame buffers
    pub fn frame_buffers(mut self, count: usize) -> Self {
        self.frame_buffers = count;
        self
    }

    /// Set the per-buffer size in bytes
    pub fn frame_size(mut self, bytes: usize) -> Self {
        self.frame_size = bytes;
        self
    }

    /// Interval between frames at the configured rate
    pub fn frame_interval(&self) -> Duration {
        if self.fps == 0 {
            return Duration::from_secs(1);
        }
        Duration::from_secs(1) / self.fps
    }
}

/// Timing knobs for the connection supervisor
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// How long one discovery attempt may take
    pub open_timeout: Duration,

    /// Delay between failed discovery attempts
    pub retry_backoff: Duration,

    /// Pause between device open and stream start
    pub settle_delay: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(2),
            settle_delay: Duration::from_millis(100),
        }
    }
}

impl CameraConfig {
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stream_config() {
        let config = StreamConfig::default();

        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.fps, 20);
        assert_eq!(config.format, PixelFormat::Mjpeg);
        assert_eq!(config.frame_buffers, 3);
        assert_eq!(config.frame_size, 512 * 1024);
    }

    #[test]
    fn test_builder_chaining() {
        let config = StreamConfig::default()
            .resolution(640, 480)
            .fps(30)
            .format(PixelFormat::Yuy2)
            .frame_buffers(6)
            .frame_size(64 * 1024);

        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.fps, 30);
        assert_eq!(config.format, PixelFormat::Yuy2);
        assert_eq!(config.frame_buffers, 6);
        assert_eq!(config.frame_size, 64 * 1024);
    }

    #[test]
    fn test_frame_interval() {
        let config = StreamConfig::default().fps(20);
        assert_eq!(config.frame_interval(), Duration::from_millis(50));

        // fps 0 must not divide by zero
        let config = StreamConfig::default().fps(0);
        assert_eq!(config.frame_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_camera_config_builder() {
        let config = CameraConfig::default()
            .open_timeout(Duration::from_secs(1))
            .retry_backoff(Duration::from_millis(500))
            .settle_delay(Duration::ZERO);

        assert_eq!(config.open_timeout, Duration::from_secs(1));
        assert_eq!(config.retry_backoff, Duration::from_millis(500));
        assert_eq!(config.settle_delay, Duration::ZERO);
    }
}
