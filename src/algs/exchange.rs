//! Collective exchange helpers built on [`Communicator`].
//!
//! Every helper here is a synchronous collective: all ranks must call it in the
//! same relative order with the same tags. Each exchange runs in two stages
//! (counts, then payload), posts all receives before sending, and drains every
//! send handle before returning, even on error.

use crate::algs::communicator::{CommTag, CommTags, Communicator, Wait};
use crate::algs::wire::{WireCount, cast_slice, cast_slice_mut};
use crate::mesh_error::MeshCouplingError;
use bytemuck::Pod;

/// Exchange per-peer item counts. `send_counts[p]` items will be sent to rank
/// `p`; the result holds the number of items each rank will send here.
pub fn exchange_sizes<C>(
    send_counts: &[usize],
    comm: &C,
    tag: CommTag,
) -> Result<Vec<usize>, MeshCouplingError>
where
    C: Communicator,
{
    let me = comm.rank();
    let n = comm.size();

    // 1) post all receives
    let mut recv_size = Vec::with_capacity(n.saturating_sub(1));
    for nbr in (0..n).filter(|&p| p != me) {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            nbr,
            tag.as_u16(),
            cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        recv_size.push((nbr, h));
    }

    // 2) post all sends and keep buffers alive until completion
    let mut pending_sends = Vec::with_capacity(n.saturating_sub(1));
    let mut send_bufs = Vec::with_capacity(n.saturating_sub(1));
    for nbr in (0..n).filter(|&p| p != me) {
        let count = WireCount::new(send_counts.get(nbr).copied().unwrap_or(0));
        pending_sends.push(comm.isend(
            nbr,
            tag.as_u16(),
            cast_slice(std::slice::from_ref(&count)),
        ));
        send_bufs.push(count);
    }

    // 3) wait for all recvs, collect counts (but do not early-return)
    let mut sizes_in = vec![0usize; n];
    if me < n {
        sizes_in[me] = send_counts.get(me).copied().unwrap_or(0);
    }
    let mut maybe_err = None;
    for (nbr, h) in recv_size {
        match h.wait() {
            Some(data) if data.len() == std::mem::size_of::<WireCount>() => {
                if maybe_err.is_none() {
                    let mut cnt = WireCount::new(0);
                    cast_slice_mut(std::slice::from_mut(&mut cnt)).copy_from_slice(&data);
                    sizes_in[nbr] = cnt.get();
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(MeshCouplingError::BufferSizeMismatch {
                    neighbor: nbr,
                    expected: std::mem::size_of::<WireCount>(),
                    got: data.len(),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(MeshCouplingError::CommError {
                    neighbor: nbr,
                    reason: format!("failed to receive size from rank {nbr}"),
                });
            }
            _ => {} // already have an error; just drain
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }
    drop(send_bufs);

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(sizes_in),
    }
}

/// Personalised all-to-all: `send[p]` goes to rank `p`, the result's entry `p`
/// is what rank `p` sent here. The local entry is copied without messaging.
pub fn all_to_all<T, C>(
    comm: &C,
    tags: CommTags,
    send: &[Vec<T>],
) -> Result<Vec<Vec<T>>, MeshCouplingError>
where
    T: Pod,
    C: Communicator,
{
    let me = comm.rank();
    let n = comm.size();
    let counts: Vec<usize> = (0..n)
        .map(|p| send.get(p).map_or(0, Vec::len))
        .collect();
    let recv_counts = exchange_sizes(&counts, comm, tags.sizes)?;

    let item = std::mem::size_of::<T>();
    let mut pending_recvs = Vec::with_capacity(n.saturating_sub(1));
    for nbr in (0..n).filter(|&p| p != me) {
        let mut buffer = vec![0u8; recv_counts[nbr] * item];
        let h = comm.irecv(nbr, tags.data.as_u16(), &mut buffer);
        pending_recvs.push((nbr, h, buffer));
    }

    let mut pending_sends = Vec::with_capacity(n.saturating_sub(1));
    for nbr in (0..n).filter(|&p| p != me) {
        let payload = send.get(nbr).map_or(&[][..], |v| &v[..]);
        pending_sends.push(comm.isend(nbr, tags.data.as_u16(), cast_slice(payload)));
    }

    let mut out: Vec<Vec<T>> = vec![Vec::new(); n];
    if let Some(local) = send.get(me) {
        out[me] = local.clone();
    }
    let mut maybe_err = None;
    for (nbr, h, mut buffer) in pending_recvs {
        match h.wait() {
            Some(raw) if raw.len() == buffer.len() => {
                if maybe_err.is_none() {
                    buffer.copy_from_slice(&raw);
                    let mut items = vec![T::zeroed(); recv_counts[nbr]];
                    cast_slice_mut(&mut items).copy_from_slice(&buffer);
                    out[nbr] = items;
                }
            }
            Some(raw) if maybe_err.is_none() => {
                maybe_err = Some(MeshCouplingError::BufferSizeMismatch {
                    neighbor: nbr,
                    expected: buffer.len(),
                    got: raw.len(),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(MeshCouplingError::CommError {
                    neighbor: nbr,
                    reason: "No data received (wait returned None)".into(),
                });
            }
            _ => {}
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

/// Every rank contributes `local`; every rank receives all contributions in
/// rank order.
pub fn all_gather<T, C>(
    comm: &C,
    tags: CommTags,
    local: &[T],
) -> Result<Vec<Vec<T>>, MeshCouplingError>
where
    T: Pod,
    C: Communicator,
{
    let send: Vec<Vec<T>> = (0..comm.size()).map(|_| local.to_vec()).collect();
    all_to_all(comm, tags, &send)
}

/// Logical AND of one flag across all ranks.
pub fn all_reduce_and<C>(comm: &C, tags: CommTags, flag: bool) -> Result<bool, MeshCouplingError>
where
    C: Communicator,
{
    let gathered = all_gather(comm, tags, &[u32::from(flag)])?;
    Ok(gathered.iter().flatten().all(|&f| f != 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, RayonComm};

    const TAGS: CommTags = CommTags::from_base(CommTag::new(0x5100));

    #[test]
    fn serial_all_to_all_is_identity() {
        let got = all_to_all(&NoComm, TAGS, &[vec![1u64, 2, 3]]).unwrap();
        assert_eq!(got, vec![vec![1u64, 2, 3]]);
    }

    #[test]
    fn three_rank_all_to_all() {
        let world = RayonComm::world(3);
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let me = comm.rank() as u32;
                    // rank r sends p+1 copies of (10*r + p) to rank p
                    let send: Vec<Vec<u32>> =
                        (0..3u32).map(|p| vec![10 * me + p; p as usize + 1]).collect();
                    all_to_all(&comm, TAGS, &send).unwrap()
                })
            })
            .collect();
        for (rank, h) in handles.into_iter().enumerate() {
            let got = h.join().expect("rank panicked");
            for (src, items) in got.iter().enumerate() {
                assert_eq!(items, &vec![10 * src as u32 + rank as u32; rank + 1]);
            }
        }
    }

    #[test]
    fn reduce_and_sees_every_rank() {
        let world = RayonComm::world(2);
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| std::thread::spawn(move || all_reduce_and(&comm, TAGS, comm.rank() == 0)))
            .collect();
        for h in handles {
            assert!(!h.join().unwrap().unwrap());
        }
    }
}
