/// Hardware watchdog keeper: arms the kernel watchdog device at startup,
/// writes a keep-alive byte every tick, and disarms on graceful shutdown.
///
/// The device is the backstop for this program itself: if the tick loop
/// stops petting it, the kernel resets the host regardless of what went
/// wrong here.
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::{error, info};

// Linux watchdog ioctl API: WDIOC_GETTIMEOUT = _IOR('W', 7, int),
// WDIOC_SETTIMEOUT = _IOWR('W', 6, int).
nix::ioctl_read!(wdioc_gettimeout, b'W', 7, nix::libc::c_int);
nix::ioctl_readwrite!(wdioc_settimeout, b'W', 6, nix::libc::c_int);

/// Keep-alive byte. Any value except the magic disarm byte feeds the timer.
const KEEPALIVE: &[u8] = b"\0";
/// Magic byte telling the driver the imminent close is intentional, so the
/// timer stops instead of resetting the host.
const DISARM: &[u8] = b"V";

/// An opened, armed watchdog device. Exclusively owned by the tick loop for
/// the process lifetime.
#[derive(Debug)]
pub struct WatchdogDevice {
    file: File,
    path: PathBuf,
}

/// Errors from opening and programming the watchdog device.
#[derive(Debug)]
pub enum DeviceError {
    /// Failed to open the device node.
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Device opened but the timeout could not be read or programmed.
    Control {
        path: PathBuf,
        source: nix::Error,
    },
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::Open { path, source } => {
                write!(f, "failed to open watchdog {}: {}", path.display(), source)
            }
            DeviceError::Control { path, source } => {
                write!(
                    f,
                    "failed to program watchdog {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::Open { source, .. } => Some(source),
            DeviceError::Control { source, .. } => Some(source),
        }
    }
}

impl WatchdogDevice {
    /// Open the device, read its current timeout, and program `timeout_secs`.
    ///
    /// Opening the node starts the timer on most drivers, so from here on
    /// the device must be petted or disarmed. A device that opens but won't
    /// take the timeout is a misconfiguration worth failing on at startup
    /// rather than running with an unknown reset window.
    pub fn open(path: &Path, timeout_secs: u32) -> Result<Self, DeviceError> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| DeviceError::Open {
                path: path.to_path_buf(),
                source: e,
            })?;

        let fd = file.as_raw_fd();
        let mut previous: nix::libc::c_int = 0;
        // SAFETY: fd is a valid open descriptor and the pointer outlives the call.
        unsafe { wdioc_gettimeout(fd, &mut previous) }.map_err(|e| DeviceError::Control {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut wanted: nix::libc::c_int = timeout_secs as nix::libc::c_int;
        // SAFETY: as above.
        unsafe { wdioc_settimeout(fd, &mut wanted) }.map_err(|e| DeviceError::Control {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            device = %path.display(),
            previous_timeout_secs = previous,
            timeout_secs = wanted,
            "hardware watchdog armed"
        );
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Feed the timer. A failed write is logged as critical but nothing
    /// more; the device's own expiry is the final backstop, and escalating
    /// from here would only mask it.
    pub fn pet(&mut self) {
        match self.file.write(KEEPALIVE) {
            Ok(1) => {}
            Ok(n) => {
                error!(
                    device = %self.path.display(),
                    written = n,
                    "short write feeding hardware watchdog"
                );
            }
            Err(e) => {
                error!(
                    device = %self.path.display(),
                    error = %e,
                    "unable to feed hardware watchdog"
                );
            }
        }
    }

    /// Write the disarm byte and close the device, so a deliberate shutdown
    /// does not reset the host.
    pub fn disarm(mut self) {
        match self.file.write_all(DISARM) {
            Ok(()) => info!(device = %self.path.display(), "hardware watchdog disarmed"),
            Err(e) => {
                error!(
                    device = %self.path.display(),
                    error = %e,
                    "failed to disarm hardware watchdog"
                );
            }
        }
    }

    /// Wrap an already-open file, skipping the ioctl programming. Lets tests
    /// exercise the write protocol against a plain file.
    #[cfg(test)]
    fn from_file(file: File, path: PathBuf) -> Self {
        Self { file, path }
    }
}
