// crates/thread-mac-rs/src/neighbor/link_quality.rs

/// Samples after which the average becomes an exponential moving average.
const RSS_AVERAGER_WINDOW: i32 = 8;

/// Link margin thresholds (dB) for link quality 1, 2 and 3.
const LQ_THRESHOLD_1: u8 = 2;
const LQ_THRESHOLD_2: u8 = 10;
const LQ_THRESHOLD_3: u8 = 20;
const LQ_HYSTERESIS: u8 = 2;

/// Averages received signal strength in 1/8 dBm resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RssAverager {
    average_x8: i32,
    count: i32,
}

impl RssAverager {
    pub fn add(&mut self, rssi: i8) {
        if self.count < RSS_AVERAGER_WINDOW {
            self.count += 1;
        }
        let sample = (rssi as i32) * 8;
        self.average_x8 += (sample - self.average_x8) / self.count;
    }

    pub fn average(&self) -> Option<i8> {
        if self.count == 0 {
            return None;
        }
        Some(((self.average_x8 - 4) / 8).clamp(i8::MIN as i32, i8::MAX as i32) as i8)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn threshold_for(link_quality: u8) -> u8 {
    match link_quality {
        3 => LQ_THRESHOLD_3,
        2 => LQ_THRESHOLD_2,
        1 => LQ_THRESHOLD_1,
        _ => 0,
    }
}

/// Maps a link margin to a link quality (0-3), holding the previous value
/// while the margin stays within the hysteresis band below its threshold.
pub fn link_quality_from_margin(link_margin: u8, last: Option<u8>) -> u8 {
    let quality = match link_margin {
        m if m > LQ_THRESHOLD_3 => 3,
        m if m > LQ_THRESHOLD_2 => 2,
        m if m > LQ_THRESHOLD_1 => 1,
        _ => 0,
    };
    match last {
        Some(last) if quality < last => {
            if link_margin.saturating_add(LQ_HYSTERESIS) > threshold_for(last) {
                last
            } else {
                quality
            }
        }
        _ => quality,
    }
}

/// Received signal statistics of one neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkQualityInfo {
    rss: RssAverager,
    last_rssi: Option<i8>,
    link_quality: Option<u8>,
}

impl LinkQualityInfo {
    pub fn add_rss(&mut self, noise_floor: i8, rssi: i8) {
        self.rss.add(rssi);
        self.last_rssi = Some(rssi);
        let margin = self.link_margin(noise_floor);
        self.link_quality = Some(link_quality_from_margin(margin, self.link_quality));
    }

    pub fn average_rss(&self) -> Option<i8> {
        self.rss.average()
    }

    pub fn last_rssi(&self) -> Option<i8> {
        self.last_rssi
    }

    /// Average RSS above the noise floor, in dB.
    pub fn link_margin(&self, noise_floor: i8) -> u8 {
        match self.rss.average() {
            Some(average) => (average as i16 - noise_floor as i16).clamp(0, u8::MAX as i16) as u8,
            None => 0,
        }
    }

    pub fn link_quality(&self) -> u8 {
        self.link_quality.unwrap_or(0)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
