use num_complex::Complex32;
use sdrscope_messages::{Decibels, DeviceConfig, Hertz};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::thread;
use std::time::Instant;

use super::{SampleBatch, SampleSource};
use crate::config::batch_period;
use crate::error::DeviceError;

const BYTES_PER_SAMPLE: usize = 2 * size_of::<f32>();

/// Gain steps advertised by a recording; gain only relabels the replay.
const FILE_GAINS: [i32; 6] = [0, 100, 200, 300, 400, 500];

/// Replays a recording of interleaved I/Q samples (little-endian f32 pairs).
///
/// Retuning is accepted and only changes the labels the display derives from
/// the configuration; the samples themselves are fixed.
#[derive(Debug)]
pub struct FileIqSource {
    reader: BufReader<File>,
    config: DeviceConfig,
    loop_on_eof: bool,
    throttle: bool,
    byte_buf: Vec<u8>,
}

impl FileIqSource {
    /// Open a recording. If `loop_on_eof` is true the file restarts from the
    /// beginning at EOF instead of ending the stream.
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: DeviceConfig,
        loop_on_eof: bool,
    ) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                DeviceError::not_found(format!("no recording at {}", path.display()))
            }
            _ => DeviceError::from(e),
        })?;
        Ok(Self {
            reader: BufReader::new(file),
            config,
            loop_on_eof,
            throttle: false,
            byte_buf: Vec::new(),
        })
    }

    /// Pace reads to the configured sample rate, like a live device.
    pub fn with_throttle(mut self, throttle: bool) -> Self {
        self.throttle = throttle;
        self
    }

    /// Fill `buf` from the file. Returns the number of samples read; 0 means EOF.
    fn read_samples(&mut self, buf: &mut [Complex32]) -> io::Result<usize> {
        let bytes_needed = buf.len() * BYTES_PER_SAMPLE;
        self.byte_buf.resize(bytes_needed, 0);

        let mut total_read = 0;
        let mut rewound_at = None;

        while total_read < bytes_needed {
            match self.reader.read(&mut self.byte_buf[total_read..]) {
                Ok(0) => {
                    // A trailing partial sample is dropped so the next pass
                    // starts on an I/Q boundary.
                    total_read -= total_read % BYTES_PER_SAMPLE;
                    // Only rewind again once a whole sample has been read
                    // since the last rewind, so a file without one cannot spin.
                    if self.loop_on_eof && rewound_at != Some(total_read) {
                        self.reader.seek(SeekFrom::Start(0))?;
                        rewound_at = Some(total_read);
                        continue;
                    }
                    break;
                }
                Ok(n) => total_read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        let samples_read = total_read / BYTES_PER_SAMPLE;
        for (sample, chunk) in buf
            .iter_mut()
            .zip(self.byte_buf[..samples_read * BYTES_PER_SAMPLE].chunks_exact(BYTES_PER_SAMPLE))
        {
            let i = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let q = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            *sample = Complex32::new(i, q);
        }

        Ok(samples_read)
    }
}

impl SampleSource for FileIqSource {
    fn config(&self) -> DeviceConfig {
        self.config
    }

    fn available_gains(&self) -> Vec<i32> {
        FILE_GAINS.to_vec()
    }

    fn set_sample_rate(&mut self, rate: Hertz) -> Result<(), DeviceError> {
        if rate.as_hz() == 0 {
            return Err(DeviceError::invalid_parameter("sample rate must be positive"));
        }
        self.config.sample_rate = rate;
        Ok(())
    }

    fn set_center_frequency(&mut self, freq: Hertz) -> Result<(), DeviceError> {
        self.config.center_frequency = freq;
        Ok(())
    }

    fn set_gain(&mut self, gain: Decibels) -> Result<(), DeviceError> {
        let max = FILE_GAINS[FILE_GAINS.len() - 1];
        if !(0..=max).contains(&gain.to_tenths()) {
            return Err(DeviceError::invalid_parameter(format!(
                "gain {gain} outside 0.0 dB..{}",
                Decibels::from_tenths(max)
            )));
        }
        self.config.gain = gain;
        Ok(())
    }

    fn read_batch(&mut self, count: usize) -> Result<Option<SampleBatch>, DeviceError> {
        let started = Instant::now();
        let mut samples = vec![Complex32::new(0.0, 0.0); count];
        let n = self.read_samples(&mut samples)?;
        if n == 0 {
            return Ok(None);
        }
        samples.truncate(n);

        if self.throttle {
            let period = batch_period(n, self.config.sample_rate);
            if let Some(remaining) = period.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }
        Ok(Some(SampleBatch::from(samples)))
    }
}
