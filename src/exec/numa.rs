//! NUMA topology detection and victim selection.
//!
//! Topology is probed once at pool init. On Linux the sysfs node tree
//! supplies per-node CPU lists and memory sizes; workers are attached to
//! nodes through their pinned CPU and node memory size ranks the "best"
//! remote node. Everywhere else (or when probing fails) the scheduler
//! falls back to uniform random victim selection, logged once.
//!
//! Victim tiers:
//! - 70%: random peer in the thief's own node
//! - 25%: worker in the highest-ranked remote node
//! -  5%: worker in a random remote node
//!
//! Remote steals report `remote = true` so the caller can widen its
//! inter-attempt pause.

/// One detected NUMA node.
#[derive(Debug, Clone)]
pub(crate) struct NumaNode {
    pub id: u32,
    pub cpus: Vec<usize>,
    pub workers: Vec<u32>,
    pub mem_kb: u64,
}

/// Detected topology plus the worker-to-node attachment.
pub(crate) struct NumaTopology {
    nodes: Vec<NumaNode>,
    /// Worker id -> index into `nodes`.
    worker_node: Vec<u32>,
    /// Index of the node with the most memory.
    best_node: u32,
    available: bool,
}

/// Fast pseudo-random number generator (xorshift32).
pub(crate) fn xorshift32(state: &mut u32) -> u32 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    *state = x;
    x
}

impl NumaTopology {
    /// Probe the system and attach `worker_count` workers to nodes.
    pub(crate) fn detect(worker_count: usize, enabled: bool) -> NumaTopology {
        if enabled {
            if let Some(topology) = Self::probe(worker_count) {
                if topology.nodes.len() > 1 {
                    log::info!(
                        "NUMA: {} nodes, best node {} ({} MB)",
                        topology.nodes.len(),
                        topology.nodes[topology.best_node as usize].id,
                        topology.nodes[topology.best_node as usize].mem_kb / 1024
                    );
                } else {
                    log::debug!("NUMA: single node, uniform victim selection");
                }
                return topology;
            }
            log::warn!("NUMA topology unavailable; falling back to uniform victim selection");
        }
        Self::single_node(worker_count)
    }

    fn single_node(worker_count: usize) -> NumaTopology {
        let node = NumaNode {
            id: 0,
            cpus: (0..num_cpus::get()).collect(),
            workers: (0..worker_count as u32).collect(),
            mem_kb: 0,
        };
        NumaTopology {
            nodes: vec![node],
            worker_node: vec![0; worker_count],
            best_node: 0,
            available: false,
        }
    }

    #[cfg(target_os = "linux")]
    fn probe(worker_count: usize) -> Option<NumaTopology> {
        let mut nodes = Vec::new();
        for entry in std::fs::read_dir("/sys/devices/system/node").ok()? {
            let entry = entry.ok()?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(id) = name
                .strip_prefix("node")
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            let cpulist =
                std::fs::read_to_string(entry.path().join("cpulist")).unwrap_or_default();
            let cpus = parse_cpulist(cpulist.trim());
            if cpus.is_empty() {
                continue;
            }

            let meminfo =
                std::fs::read_to_string(entry.path().join("meminfo")).unwrap_or_default();
            let mem_kb = parse_node_mem_kb(&meminfo);

            nodes.push(NumaNode {
                id,
                cpus,
                workers: Vec::new(),
                mem_kb,
            });
        }

        if nodes.is_empty() {
            return None;
        }
        nodes.sort_by_key(|n| n.id);

        // Attach workers to nodes by their ideal CPU: worker i takes the
        // i-th CPU in node order, wrapping.
        let all_cpus: Vec<(usize, usize)> = nodes
            .iter()
            .enumerate()
            .flat_map(|(idx, n)| n.cpus.iter().map(move |&c| (idx, c)))
            .collect();

        let mut worker_node = vec![0u32; worker_count];
        for worker in 0..worker_count {
            let (node_idx, _) = all_cpus[worker % all_cpus.len()];
            worker_node[worker] = node_idx as u32;
            nodes[node_idx].workers.push(worker as u32);
        }

        let best_node = nodes
            .iter()
            .enumerate()
            .max_by_key(|(_, n)| n.mem_kb)
            .map(|(i, _)| i as u32)
            .unwrap_or(0);

        Some(NumaTopology {
            nodes,
            worker_node,
            best_node,
            available: true,
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn probe(_worker_count: usize) -> Option<NumaTopology> {
        None
    }

    /// Whether multi-node selection is active.
    pub(crate) fn is_available(&self) -> bool {
        self.available && self.nodes.len() > 1
    }

    /// Node index a worker is attached to.
    pub(crate) fn node_of(&self, worker: u32) -> u32 {
        self.worker_node
            .get(worker as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Pin the calling thread to its node's CPU set.
    pub(crate) fn pin_current_thread(&self, worker: u32) {
        let node = &self.nodes[self.node_of(worker) as usize];
        if node.cpus.is_empty() {
            return;
        }
        let position = node
            .workers
            .iter()
            .position(|&w| w == worker)
            .unwrap_or(worker as usize);
        let cpu = node.cpus[position % node.cpus.len()];
        core_affinity::set_for_current(core_affinity::CoreId { id: cpu });
    }

    /// Pick a steal victim for `thief`. Returns `(victim, remote)`.
    pub(crate) fn select_victim(
        &self,
        thief: u32,
        worker_count: u32,
        rng: &mut u32,
    ) -> (u32, bool) {
        debug_assert!(worker_count > 1);

        if !self.is_available() {
            return (self.uniform_victim(thief, worker_count, rng), false);
        }

        let my_node = self.node_of(thief) as usize;
        let roll = xorshift32(rng) % 100;

        if roll < 70 {
            // Same-node peer.
            let peers = &self.nodes[my_node].workers;
            if peers.len() > 1 {
                for _ in 0..4 {
                    let candidate = peers[(xorshift32(rng) as usize) % peers.len()];
                    if candidate != thief {
                        return (candidate, false);
                    }
                }
            }
            return (self.uniform_victim(thief, worker_count, rng), false);
        }

        let node_idx = if roll < 95 && self.best_node as usize != my_node {
            self.best_node as usize
        } else {
            // Random remote node.
            let mut idx = (xorshift32(rng) as usize) % self.nodes.len();
            if idx == my_node {
                idx = (idx + 1) % self.nodes.len();
            }
            idx
        };

        let workers = &self.nodes[node_idx].workers;
        if workers.is_empty() {
            return (self.uniform_victim(thief, worker_count, rng), false);
        }
        let candidate = workers[(xorshift32(rng) as usize) % workers.len()];
        if candidate == thief {
            return (self.uniform_victim(thief, worker_count, rng), false);
        }
        (candidate, node_idx != my_node)
    }

    fn uniform_victim(&self, thief: u32, worker_count: u32, rng: &mut u32) -> u32 {
        let mut victim = xorshift32(rng) % worker_count;
        if victim == thief {
            victim = (victim + 1) % worker_count;
        }
        victim
    }
}

/// Parse a sysfs CPU list like `0-3,8,10-11`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_cpulist(list: &str) -> Vec<usize> {
    let mut cpus = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((lo, hi)) = part.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.parse::<usize>(), hi.parse::<usize>()) {
                cpus.extend(lo..=hi);
            }
        } else if let Ok(cpu) = part.parse::<usize>() {
            cpus.push(cpu);
        }
    }
    cpus
}

/// Pull the MemTotal figure out of a node meminfo file.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_node_mem_kb(meminfo: &str) -> u64 {
    for line in meminfo.lines() {
        if line.contains("MemTotal:") {
            return line
                .split_whitespace()
                .rev()
                .nth(1)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpulist() {
        assert_eq!(parse_cpulist("0-3"), vec![0, 1, 2, 3]);
        assert_eq!(parse_cpulist("0,2,4"), vec![0, 2, 4]);
        assert_eq!(parse_cpulist("0-1,8-9"), vec![0, 1, 8, 9]);
        assert_eq!(parse_cpulist(""), Vec::<usize>::new());
    }

    #[test]
    fn test_parse_node_mem() {
        let meminfo = "Node 0 MemTotal:       32657096 kB\nNode 0 MemFree: 100 kB\n";
        assert_eq!(parse_node_mem_kb(meminfo), 32657096);
    }

    #[test]
    fn test_xorshift_is_deterministic() {
        let mut a = 0x9e3779b9;
        let mut b = 0x9e3779b9;
        for _ in 0..16 {
            assert_eq!(xorshift32(&mut a), xorshift32(&mut b));
        }
        assert_ne!(a, 0x9e3779b9);
    }

    #[test]
    fn test_fallback_never_selects_self() {
        let topology = NumaTopology::single_node(4);
        let mut rng = 12345;
        for _ in 0..256 {
            let (victim, remote) = topology.select_victim(2, 4, &mut rng);
            assert_ne!(victim, 2);
            assert!(victim < 4);
            assert!(!remote);
        }
    }

    #[test]
    fn test_multi_node_selection_stays_in_range() {
        let nodes = vec![
            NumaNode {
                id: 0,
                cpus: vec![0, 1],
                workers: vec![0, 1],
                mem_kb: 1024,
            },
            NumaNode {
                id: 1,
                cpus: vec![2, 3],
                workers: vec![2, 3],
                mem_kb: 4096,
            },
        ];
        let topology = NumaTopology {
            nodes,
            worker_node: vec![0, 0, 1, 1],
            best_node: 1,
            available: true,
        };

        let mut rng = 7;
        let mut saw_remote = false;
        for _ in 0..512 {
            let (victim, remote) = topology.select_victim(0, 4, &mut rng);
            assert_ne!(victim, 0);
            assert!(victim < 4);
            saw_remote |= remote;
        }
        assert!(saw_remote, "remote tiers should fire within 512 rolls");
    }
}
