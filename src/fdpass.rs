//! Listener descriptor transfer over a connected UNIX stream (SCM_RIGHTS).
//!
//! The descriptor travels as ancillary data on a one-byte message: stream
//! sockets do not deliver control data attached to an empty payload. The
//! byte itself carries no meaning and is ignored by the receiver.
//!
//! Sending does not close the sender's descriptor. The receiver gets a new
//! descriptor for the same kernel socket; closing either copy leaves the
//! other one working.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::io::{self, ErrorKind};
use std::mem;
use std::net::TcpListener;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;

use tokio::io::Interest;
use tokio::net::UnixStream;

use crate::error::{HandoverError, Result};

/// Size of one descriptor in an SCM_RIGHTS payload.
const FD_SIZE: usize = mem::size_of::<RawFd>();

/// Descriptors the receive buffer has room for. Only the first is kept; the
/// rest are closed.
const MAX_RECV_FDS: usize = 4;

/// Filler byte carried alongside the descriptor.
const CARRIER_BYTE: u8 = 0;

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

#[cfg(any(target_os = "linux", target_os = "android"))]
const RECV_FLAGS: libc::c_int = libc::MSG_CMSG_CLOEXEC;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const RECV_FLAGS: libc::c_int = 0;

/// cmsghdr-aligned control buffer.
#[repr(C, align(8))]
struct ControlBuffer([u8; 64]);

impl ControlBuffer {
    fn new() -> Self {
        Self([0; 64])
    }
}

/// What a single `recvmsg` produced.
enum Received {
    Descriptor(OwnedFd),
    /// Peer closed the stream.
    Closed,
    /// Data arrived without SCM_RIGHTS.
    Empty,
    /// Kernel dropped part of the control data (MSG_CTRUNC).
    Truncated,
}

/// Send `fd` over `stream`.
pub async fn send_fd(stream: &UnixStream, fd: BorrowedFd<'_>) -> Result<()> {
    loop {
        stream.writable().await.map_err(HandoverError::SendFd)?;
        match stream.try_io(Interest::WRITABLE, || {
            sendmsg_fd(stream.as_raw_fd(), fd.as_raw_fd())
        }) {
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => continue,
            Err(e) => return Err(HandoverError::SendFd(e)),
            Ok(()) => return Ok(()),
        }
    }
}

/// Receive one descriptor from `stream`.
///
/// Fails if the peer closes the stream, sends data without a descriptor, or
/// the control message was truncated.
pub async fn recv_fd(stream: &UnixStream) -> Result<OwnedFd> {
    let received = loop {
        stream.readable().await.map_err(HandoverError::RecvFd)?;
        match stream.try_io(Interest::READABLE, || recvmsg_fd(stream.as_raw_fd())) {
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => continue,
            Err(e) => return Err(HandoverError::RecvFd(e)),
            Ok(received) => break received,
        }
    };

    match received {
        Received::Descriptor(fd) => {
            set_cloexec(&fd)?;
            Ok(fd)
        }
        Received::Closed => Err(HandoverError::ChannelClosed),
        Received::Empty => Err(HandoverError::NoDescriptor),
        Received::Truncated => Err(HandoverError::TruncatedControl),
    }
}

/// Wrap a received descriptor as a TCP listener after checking it is one.
pub fn listener_from_fd(fd: OwnedFd) -> Result<TcpListener> {
    if !is_listening(&fd)? {
        return Err(HandoverError::NotListening);
    }
    Ok(TcpListener::from(fd))
}

fn sendmsg_fd(socket: RawFd, fd: RawFd) -> io::Result<()> {
    let mut payload = [CARRIER_BYTE];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr().cast(),
        iov_len: payload.len(),
    };
    let mut control = ControlBuffer::new();

    // SAFETY: msghdr is plain data; all-zero is a valid empty header.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.0.as_mut_ptr().cast();
    // SAFETY: CMSG_SPACE is a pure size computation.
    msg.msg_controllen = unsafe { libc::CMSG_SPACE(FD_SIZE as libc::c_uint) } as _;

    // SAFETY: msg_control points at a zeroed, aligned buffer of at least
    // CMSG_SPACE(FD_SIZE) bytes, so CMSG_FIRSTHDR is non-null and the header
    // plus one descriptor fit inside it.
    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(FD_SIZE as libc::c_uint) as _;
        ptr::write_unaligned(libc::CMSG_DATA(cmsg).cast::<RawFd>(), fd);
    }

    // SAFETY: msg and everything it points to outlive the call.
    let sent = unsafe { libc::sendmsg(socket, &msg, SEND_FLAGS) };
    match sent {
        n if n < 0 => Err(io::Error::last_os_error()),
        0 => Err(ErrorKind::WriteZero.into()),
        _ => Ok(()),
    }
}

fn recvmsg_fd(socket: RawFd) -> io::Result<Received> {
    let mut payload = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr().cast(),
        iov_len: payload.len(),
    };
    let mut control = ControlBuffer::new();

    // SAFETY: msghdr is plain data; all-zero is a valid empty header.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.0.as_mut_ptr().cast();
    // SAFETY: CMSG_SPACE is a pure size computation.
    let space = unsafe { libc::CMSG_SPACE((FD_SIZE * MAX_RECV_FDS) as libc::c_uint) } as usize;
    msg.msg_controllen = space.min(control.0.len()) as _;

    // SAFETY: msg and everything it points to outlive the call.
    let read = unsafe { libc::recvmsg(socket, &mut msg, RECV_FLAGS) };
    if read < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut fds = Vec::new();
    // SAFETY: the kernel filled msg_control with well-formed cmsghdrs up to
    // msg_controllen; CMSG_FIRSTHDR/CMSG_NXTHDR stay within that range.
    // Every SCM_RIGHTS entry is a descriptor installed in this process that
    // nothing else owns yet.
    unsafe {
        let header_len = libc::CMSG_LEN(0) as usize;
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let data = libc::CMSG_DATA(cmsg).cast::<RawFd>();
                let count = ((*cmsg).cmsg_len as usize).saturating_sub(header_len) / FD_SIZE;
                for i in 0..count {
                    fds.push(OwnedFd::from_raw_fd(ptr::read_unaligned(data.add(i))));
                }
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }

    // Dropping `fds` closes anything we will not hand out.
    if msg.msg_flags & libc::MSG_CTRUNC != 0 {
        return Ok(Received::Truncated);
    }
    let mut fds = fds.into_iter();
    Ok(match fds.next() {
        Some(fd) => Received::Descriptor(fd),
        None if read == 0 => Received::Closed,
        None => Received::Empty,
    })
}

fn set_cloexec(fd: &OwnedFd) -> io::Result<()> {
    // SAFETY: fcntl on a descriptor we own.
    let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::FD_CLOEXEC != 0 {
        return Ok(());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn is_listening(fd: &OwnedFd) -> io::Result<bool> {
    let mut value: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    // SAFETY: value/len describe a valid c_int out-buffer.
    let rc = unsafe {
        libc::getsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_ACCEPTCONN,
            (&mut value as *mut libc::c_int).cast(),
            &mut len,
        )
    };
    if rc < 0 {
        let err = io::Error::last_os_error();
        // Not a socket at all.
        if err.raw_os_error() == Some(libc::ENOTSOCK) {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(value != 0)
}
