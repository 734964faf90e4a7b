//! 地址生命周期管理
//!
//! 地址的分配与释放和 GSL 挂接/拆除同步进行。任一时刻一个地面接口
//! 至多绑定一个地址；同一地址不会同时属于两个接口。

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use tracing::{debug, trace};

use super::id::{InterfaceId, NodeId};
use crate::error::{Result, TopoError};
use crate::sim::AddressingSpec;

/// 编址策略
#[derive(Debug, Clone, PartialEq)]
pub enum AddressingPolicy {
    /// 每颗卫星拥有 `pool` 中一个 `/block_prefix` 固定地址块：
    /// 块内第 1 个主机地址属于卫星，其余分给挂接到它的地面接口。
    PerSatelliteFixedSegment { pool: Ipv4Network, block_prefix: u8 },
    /// 地面接口持有 `ground_pool` 中的固定地址，与所挂接卫星无关。
    SharedGroundSegment {
        satellite_pool: Ipv4Network,
        ground_pool: Ipv4Network,
    },
}

impl From<&AddressingSpec> for AddressingPolicy {
    fn from(spec: &AddressingSpec) -> Self {
        match spec {
            AddressingSpec::PerSatelliteFixedSegment { pool, block_prefix } => {
                AddressingPolicy::PerSatelliteFixedSegment {
                    pool: *pool,
                    block_prefix: *block_prefix,
                }
            }
            AddressingSpec::SharedGroundSegment {
                satellite_pool,
                ground_pool,
            } => AddressingPolicy::SharedGroundSegment {
                satellite_pool: *satellite_pool,
                ground_pool: *ground_pool,
            },
        }
    }
}

fn network_size(net: &Ipv4Network) -> u64 {
    1u64 << (32 - u32::from(net.prefix()))
}

/// 卫星对地地址块
#[derive(Debug, Clone)]
struct SatelliteBlock {
    network: Ipv4Network,
    /// 已占用的主机序号
    used: BTreeSet<u32>,
}

impl SatelliteBlock {
    /// 可分给地面接口的主机序号范围 [2, size-1)
    fn ground_slots(&self) -> std::ops::Range<u32> {
        let size = network_size(&self.network) as u32;
        2..size.saturating_sub(1)
    }

    fn take_lowest_free(&mut self) -> Option<u32> {
        let slot = self.ground_slots().find(|s| !self.used.contains(s))?;
        self.used.insert(slot);
        Some(slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    address: Ipv4Addr,
    satellite: NodeId,
    /// PerSatelliteFixedSegment 下在卫星块中的主机序号
    slot: Option<u32>,
}

#[derive(Debug)]
pub struct AddressLifecycleManager {
    policy: AddressingPolicy,
    blocks: HashMap<NodeId, SatelliteBlock>,
    bound: HashMap<InterfaceId, Binding>,
    owner: HashMap<Ipv4Addr, InterfaceId>,
}

impl AddressLifecycleManager {
    pub fn new(policy: AddressingPolicy) -> Self {
        Self {
            policy,
            blocks: HashMap::new(),
            bound: HashMap::new(),
            owner: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &AddressingPolicy {
        &self.policy
    }

    /// 卫星的对地接口地址
    pub fn satellite_address(&self, sat: NodeId) -> Result<Ipv4Addr> {
        match &self.policy {
            AddressingPolicy::PerSatelliteFixedSegment { pool, block_prefix } => {
                let block = satellite_block(pool, *block_prefix, sat)?;
                nth(&block, 1)
            }
            AddressingPolicy::SharedGroundSegment { satellite_pool, .. } => {
                let idx = u32::try_from(sat.0 + 1).map_err(|_| exhausted(satellite_pool))?;
                nth(satellite_pool, idx)
            }
        }
    }

    /// 为挂接到 `sat` 的接口分配地址。
    ///
    /// 接口已绑定地址时返回 `InvariantViolation`：调用方必须先 release
    /// （即先 Detach 再 Attach）。
    pub fn allocate(&mut self, iface: InterfaceId, sat: NodeId) -> Result<Ipv4Addr> {
        if let Some(b) = self.bound.get(&iface) {
            return Err(TopoError::invariant(format!(
                "{iface} already bound to {} (via satellite {}), cannot allocate for {sat}",
                b.address, b.satellite
            )));
        }

        let binding = match &self.policy {
            AddressingPolicy::PerSatelliteFixedSegment { pool, block_prefix } => {
                let (pool, prefix) = (*pool, *block_prefix);
                if !self.blocks.contains_key(&sat) {
                    let network = satellite_block(&pool, prefix, sat)?;
                    self.blocks.insert(
                        sat,
                        SatelliteBlock {
                            network,
                            used: BTreeSet::new(),
                        },
                    );
                }
                let Some(block) = self.blocks.get_mut(&sat) else {
                    return Err(TopoError::invariant(format!("no address block for {sat}")));
                };
                let slot = block.take_lowest_free().ok_or_else(|| {
                    TopoError::AddressExhausted(format!(
                        "block {} of satellite {sat} has no free host address",
                        block.network
                    ))
                })?;
                Binding {
                    address: nth(&block.network, slot)?,
                    satellite: sat,
                    slot: Some(slot),
                }
            }
            AddressingPolicy::SharedGroundSegment { ground_pool, .. } => {
                let idx = u32::try_from(iface.0 + 1).map_err(|_| exhausted(ground_pool))?;
                Binding {
                    address: nth(ground_pool, idx)?,
                    satellite: sat,
                    slot: None,
                }
            }
        };

        if let Some(other) = self.owner.get(&binding.address) {
            return Err(TopoError::invariant(format!(
                "address {} double-allocated to {iface} and {other}",
                binding.address
            )));
        }
        self.owner.insert(binding.address, iface);
        self.bound.insert(iface, binding);
        debug!(%iface, satellite = %sat, address = %binding.address, "📮 分配地址");
        Ok(binding.address)
    }

    /// 释放接口地址；接口未绑定时是 no-op
    pub fn release(&mut self, iface: InterfaceId) -> Option<Ipv4Addr> {
        let binding = self.bound.remove(&iface)?;
        self.owner.remove(&binding.address);
        if let Some(slot) = binding.slot {
            if let Some(block) = self.blocks.get_mut(&binding.satellite) {
                block.used.remove(&slot);
            }
        }
        trace!(%iface, address = %binding.address, "释放地址");
        Some(binding.address)
    }

    pub fn address_of(&self, iface: InterfaceId) -> Option<Ipv4Addr> {
        self.bound.get(&iface).map(|b| b.address)
    }

    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// 校验：每个地址只属于一个接口，反向索引与绑定表一致
    pub fn check_invariants(&self) -> Result<()> {
        if self.owner.len() != self.bound.len() {
            return Err(TopoError::invariant(format!(
                "address index out of sync: {} owners, {} bindings",
                self.owner.len(),
                self.bound.len()
            )));
        }
        for (iface, b) in &self.bound {
            if self.owner.get(&b.address) != Some(iface) {
                return Err(TopoError::invariant(format!(
                    "address {} bound to {iface} but owned by {:?}",
                    b.address,
                    self.owner.get(&b.address)
                )));
            }
        }
        Ok(())
    }
}

fn exhausted(net: &Ipv4Network) -> TopoError {
    TopoError::AddressExhausted(format!("pool {net} exhausted"))
}

fn nth(net: &Ipv4Network, n: u32) -> Result<Ipv4Addr> {
    if u64::from(n) >= network_size(net) {
        return Err(exhausted(net));
    }
    net.nth(n).ok_or_else(|| exhausted(net))
}

/// 卫星 `sat` 在 `pool` 中的第 sat 个 `/prefix` 子块
fn satellite_block(pool: &Ipv4Network, prefix: u8, sat: NodeId) -> Result<Ipv4Network> {
    let block_size = 1u64 << (32 - u32::from(prefix));
    let offset = (sat.0 as u64).saturating_mul(block_size);
    if offset.saturating_add(block_size) > network_size(pool) {
        return Err(TopoError::AddressExhausted(format!(
            "pool {pool} has no /{prefix} block left for satellite {sat}"
        )));
    }
    let base = u64::from(u32::from(pool.network())) + offset;
    let base = Ipv4Addr::from(base as u32);
    Ipv4Network::new(base, prefix)
        .map_err(|e| TopoError::Config(format!("invalid satellite block {base}/{prefix}: {e}")))
}
